use async_trait::async_trait;
use cflow_core::{
    AiProvider, CflowError, CompletionOptions, CompletionProvider, ComponentStatus, ContentRequest, DataSourceFilter,
    InMemoryRecordStore, InMemoryWorkflowStore, PipelineEvent, Priority, ProviderError, RecordStore, Result, RunStage,
    SourceRecord, SourceType, TemplateType, ThrottleState,
};
use cflow_orchestrator::{Contentflow, ContentflowConfig};
use cflow_validator::FixKind;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const RECORDS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testing/fixtures/records.yaml");
const REQUESTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testing/fixtures/requests.yaml");
const CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testing/fixtures/contentflow.yaml");

fn fixture_records() -> Vec<SourceRecord> {
    let text = std::fs::read_to_string(RECORDS).unwrap();
    serde_yaml::from_str(&text).unwrap()
}

fn config() -> ContentflowConfig {
    ContentflowConfig::load(CONFIG).unwrap()
}

struct Harness {
    flow: Contentflow,
    records: Arc<InMemoryRecordStore>,
    workflows: Arc<InMemoryWorkflowStore>,
}

fn harness_with(config: ContentflowConfig, provider: AiProvider) -> Harness {
    let records = Arc::new(InMemoryRecordStore::with_records(fixture_records()));
    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let flow = Contentflow::new(config, records.clone(), workflows.clone(), provider).unwrap();
    Harness {
        flow,
        records,
        workflows,
    }
}

fn harness() -> Harness {
    harness_with(config(), AiProvider::Unavailable)
}

fn changelog_for(id: &str) -> ContentRequest {
    ContentRequest::for_type(TemplateType::ChangelogEntry)
        .with_source(DataSourceFilter::new(SourceType::ProductUpdate).with_ids([id]))
}

/// Serves a fixed draft for generation prompts and a fixed body for revisions
struct ScriptedWriter {
    draft: &'static str,
    revision: &'static str,
    revisions: AtomicUsize,
}

impl ScriptedWriter {
    fn new(draft: &'static str, revision: &'static str) -> Arc<Self> {
        Arc::new(Self {
            draft,
            revision,
            revisions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedWriter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> std::result::Result<String, ProviderError> {
        if prompt.starts_with("Revise this") {
            self.revisions.fetch_add(1, Ordering::SeqCst);
            return Ok(self.revision.to_string());
        }
        Ok(self.draft.to_string())
    }
}

/// Fails every competitive signal fetch, serves the rest
struct PartialStore {
    inner: InMemoryRecordStore,
}

#[async_trait]
impl RecordStore for PartialStore {
    async fn fetch(&self, source_type: SourceType, filter: &DataSourceFilter) -> Result<Vec<SourceRecord>> {
        if source_type == SourceType::CompetitiveSignal {
            return Err(CflowError::Store("signal feed unreachable".into()));
        }
        self.inner.fetch(source_type, filter).await
    }

    async fn persist(&self, kind: &str, entity: Value) -> Result<String> {
        self.inner.persist(kind, entity).await
    }
}

#[test]
fn test_fixture_config_overrides_defaults() {
    let config = config();
    assert_eq!(config.orchestrator.max_concurrency, 2);
    assert_eq!(config.orchestrator.sla_hours.urgent, 2);
    assert_eq!(config.orchestrator.sla_hours.normal, 48);
    assert!(!config.generation.use_ai);
    assert!(config.monitor.halt_on_critical);
    assert!(!config.monitor.system_metrics);
}

#[tokio::test]
async fn test_changelog_run_completes() {
    let h = harness();
    let mut events = h.flow.events();

    let run = h.flow.run(&changelog_for("pu-1")).await;
    assert!(run.success, "{:?}", run.error);
    assert_eq!(run.stage, RunStage::Done);
    assert_eq!(run.template_id.as_deref(), Some("changelog-standard"));
    assert_eq!(run.data_quality_score, 1.0);
    assert!(run.enhancement.is_none());
    assert!(run.workflow_id.is_none());

    let content = run.content.as_ref().unwrap();
    assert_eq!(content.content_title, "Resumable sync");
    assert!(content.body.contains("Version 2.4 of Contentflow"));
    assert!(content.body.contains("- Offline queue"));
    assert!(content.body.contains("Tracked in CF-101."));
    assert!(!content.ai_generated);
    assert!(run.quality_score().unwrap() > 0.9);

    let persisted_id = run.persisted_id.as_deref().unwrap();
    let (kind, entity) = h.records.persisted(persisted_id).await.unwrap();
    assert_eq!(kind, "generated_content");
    assert_eq!(entity["template_id"], "changelog-standard");

    match events.recv().await.unwrap() {
        PipelineEvent::PipelineCompleted {
            pipeline_id, success, ..
        } => {
            assert_eq!(pipeline_id, run.pipeline_id);
            assert!(success);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let stats = h.flow.pipeline().stats();
    assert_eq!(stats.runs_total, 1);
    assert_eq!(stats.successful_runs, 1);
}

#[tokio::test]
async fn test_stage_timings_follow_run_order() {
    let h = harness();
    let run = h.flow.run(&changelog_for("pu-1")).await;
    let stages: Vec<RunStage> = run.performance.stages.iter().map(|t| t.stage).collect();
    assert_eq!(
        stages,
        vec![
            RunStage::ValidatingRequest,
            RunStage::GatheringData,
            RunStage::DerivingInsights,
            RunStage::SelectingTemplate,
            RunStage::GeneratingContent,
            RunStage::ValidatingOutput,
            RunStage::CreatingWorkflow,
        ]
    );
}

#[tokio::test]
async fn test_fixable_content_recovers_after_enhancement() {
    let h = harness();
    let request = changelog_for("pu-1").with_variable("summary", "we fixed teh sync bug.");

    let run = h.flow.run(&request).await;
    assert!(run.success, "{:?}", run.error);

    let enhancement = run.enhancement.as_ref().unwrap();
    assert!(enhancement.passed);
    assert!(!enhancement.ai_revised);
    assert!(enhancement.fixes_applied.contains(&FixKind::CapitalizeSentenceStart));
    assert!(enhancement.score_after > enhancement.score_before);

    let body = &run.content.as_ref().unwrap().body;
    assert!(body.contains("We fixed the sync bug."));
    assert!(!body.contains("teh"));

    let stats = h.flow.pipeline().stats();
    assert_eq!(stats.enhancements_attempted, 1);
    assert_eq!(stats.enhancements_recovered, 1);
}

#[tokio::test]
async fn test_enhancement_runs_once_then_fails() {
    // critical grammar issues are fixable, the vague link is not but is only advisory
    let writer = ScriptedWriter::new(
        "## Resumable sync\n\nwe fixed teh sync bug for every team. Click here for details.",
        "## Resumable sync\n\nwe fixed teh sync bug for every team.",
    );
    let h = harness_with(config(), AiProvider::new(writer.clone()));

    let run = h.flow.run(&changelog_for("pu-1")).await;
    assert!(!run.success);
    assert_eq!(run.stage, RunStage::Failed);
    assert_eq!(run.failed_at, Some(RunStage::EnhancingContent));
    assert_eq!(run.error_kind.as_deref(), Some("validation_failure"));
    assert_eq!(writer.revisions.load(Ordering::SeqCst), 1);

    let enhancement = run.enhancement.as_ref().unwrap();
    assert!(enhancement.ai_revised);
    assert!(!enhancement.passed);

    // best effort output survives the failure
    let content = run.content.as_ref().unwrap();
    assert!(content.ai_generated);
    assert!(content.body.contains("teh"));
    assert!(run.persisted_id.is_none());
    assert_eq!(h.records.persisted_count().await, 0);
}

#[tokio::test]
async fn test_unfixable_critical_issue_skips_enhancement() {
    // a writer that would happily drop the figure is never asked to
    let writer = ScriptedWriter::new(
        "## Resumable sync\n\nSync is 40% faster for every team now.",
        "## Resumable sync\n\nSync is faster for every team now.",
    );
    let h = harness_with(config(), AiProvider::new(writer.clone()));

    let run = h.flow.run(&changelog_for("pu-1")).await;
    assert!(!run.success);
    assert_eq!(run.failed_at, Some(RunStage::ValidatingOutput));
    assert_eq!(run.error_kind.as_deref(), Some("validation_failure"));
    assert_eq!(writer.revisions.load(Ordering::SeqCst), 0);
    assert!(run.enhancement.is_none());

    let error = run.error.as_deref().unwrap();
    assert!(error.contains("human review"), "{error}");
    assert!(error.contains("uncited statistic"), "{error}");
    assert!(run.content.as_ref().unwrap().body.contains("40%"));
    assert!(run.persisted_id.is_none());
    assert_eq!(h.flow.pipeline().stats().enhancements_attempted, 0);
}

#[tokio::test]
async fn test_unfixable_critical_issue_blocks_template_output() {
    let h = harness();
    let run = h
        .flow
        .run(&changelog_for("pu-1").with_variable("summary", "Sync is 40% faster now."))
        .await;
    assert!(!run.success);
    assert_eq!(run.failed_at, Some(RunStage::ValidatingOutput));
    assert!(run.enhancement.is_none());
    assert!(run.error.as_deref().unwrap().contains("fact_accuracy"));
}

#[tokio::test]
async fn test_enhancement_disabled_fails_at_output_validation() {
    let mut config = config();
    config.orchestrator.enhancement_enabled = false;
    let h = harness_with(config, AiProvider::Unavailable);

    let run = h
        .flow
        .run(&changelog_for("pu-1").with_variable("summary", "we fixed teh sync bug."))
        .await;
    assert!(!run.success);
    assert_eq!(run.failed_at, Some(RunStage::ValidatingOutput));
    assert!(run.enhancement.is_none());
    assert_eq!(h.flow.pipeline().stats().enhancements_attempted, 0);
}

#[tokio::test]
async fn test_batch_items_fail_independently() {
    let h = harness();
    let requests: Vec<ContentRequest> = serde_yaml::from_str(&std::fs::read_to_string(REQUESTS).unwrap()).unwrap();
    assert_eq!(requests.len(), 3);

    let report = h.flow.run_batch(requests).await;
    assert_eq!(report.total_requests, 3);
    assert_eq!(report.successful_requests, 2);
    assert_eq!(report.failed_requests, 1);

    // reports keep request order
    assert!(report.runs[0].success);
    let failed = &report.runs[1];
    assert!(!failed.success);
    assert_eq!(failed.failed_at, Some(RunStage::SelectingTemplate));
    assert_eq!(failed.error_kind.as_deref(), Some("template_not_found"));
    assert!(failed.content.is_none());

    let approved = &report.runs[2];
    assert!(approved.success, "{:?}", approved.error);
    assert!(approved.workflow_id.is_some());
    assert_eq!(h.workflows.len().await, 1);

    let stats = h.flow.pipeline().stats();
    assert_eq!(stats.runs_total, 3);
    assert_eq!(stats.failed_runs, 1);
}

#[tokio::test]
async fn test_approval_workflow_created_and_announced() {
    let h = harness();
    let mut events = h.flow.events();
    let request = changelog_for("pu-2").requiring_approval().with_priority(Priority::Urgent);

    let run = h.flow.run(&request).await;
    assert!(run.success, "{:?}", run.error);

    let workflow_id = run.workflow_id.clone().unwrap();
    let workflow = h.workflows.get(&workflow_id).await.unwrap();
    let content = run.content.as_ref().unwrap();
    assert_eq!(workflow.content_id, content.id);
    assert_eq!(workflow.steps.len(), 1);
    assert_eq!(workflow.steps[0].name, "content_review");
    // fixture config shortens the urgent SLA
    assert_eq!(workflow.steps[0].sla_hours, 2);
    assert_eq!(workflow.reviewers, vec!["editor".to_string()]);

    match events.recv().await.unwrap() {
        PipelineEvent::ApprovalRequest {
            workflow_id: announced,
            content_type,
            content_title,
            steps,
            ..
        } => {
            assert_eq!(announced, workflow_id);
            assert_eq!(content_type, TemplateType::ChangelogEntry);
            assert_eq!(content_title, "Inline review comments");
            assert_eq!(steps.len(), 1);
        }
        other => panic!("expected approval request, got {:?}", other),
    }
}

#[tokio::test]
async fn test_halted_pipeline_fails_fast() {
    let h = harness();
    h.flow.throttle().set(ThrottleState::Halted);

    let run = h.flow.run(&changelog_for("pu-1")).await;
    assert!(!run.success);
    assert_eq!(run.failed_at, Some(RunStage::ValidatingRequest));
    assert_eq!(run.error_kind.as_deref(), Some("component_unhealthy"));
    assert!(run.content.is_none());
    assert_eq!(h.records.persisted_count().await, 0);
    assert_eq!(h.flow.pipeline().batch_concurrency(), 1);
}

#[tokio::test]
async fn test_conflicting_targets_rejected() {
    let h = harness();
    let request = ContentRequest {
        template_id: Some("changelog-standard".into()),
        content_type: Some(TemplateType::ChangelogEntry),
        ..Default::default()
    };
    let run = h.flow.run(&request).await;
    assert!(!run.success);
    assert_eq!(run.failed_at, Some(RunStage::ValidatingRequest));
    assert_eq!(run.error_kind.as_deref(), Some("input_validation"));
    assert!(run.insights.is_none());
}

#[tokio::test]
async fn test_failed_source_lowers_data_quality() {
    let store = Arc::new(PartialStore {
        inner: InMemoryRecordStore::with_records(fixture_records()),
    });
    let flow = Contentflow::new(
        config(),
        store.clone(),
        Arc::new(InMemoryWorkflowStore::new()),
        AiProvider::Unavailable,
    )
    .unwrap();

    let request = changelog_for("pu-1").with_source(DataSourceFilter::new(SourceType::CompetitiveSignal));
    let run = flow.run(&request).await;
    assert!(run.success, "{:?}", run.error);
    assert_eq!(run.source_errors.len(), 1);
    assert!((run.data_quality_score - 0.5).abs() < 1e-9);
    assert_eq!(store.inner.persisted_count().await, 1);
}

#[tokio::test]
async fn test_insights_rank_changelog_for_product_updates() {
    let h = harness();
    let run = h.flow.run(&changelog_for("pu-1")).await;
    let insights = run.insights.unwrap();
    assert!(insights
        .content_opportunities
        .iter()
        .any(|o| o.content_type == TemplateType::ChangelogEntry));
    assert!(insights.rank_of(TemplateType::ChangelogEntry).is_some());
}

#[tokio::test]
async fn test_health_check_covers_every_component() {
    let h = harness();
    h.flow.run(&changelog_for("pu-1")).await;

    let check = h.flow.check_health().await;
    assert_eq!(check.components.len(), 4);
    for name in ["content_pipeline", "generation_engine", "template_validator"] {
        let component = check.component(name).unwrap_or_else(|| panic!("missing {}", name));
        assert_eq!(component.status, ComponentStatus::Healthy, "{}", name);
    }
    // no AI provider wired, so the classifier runs its local passes only
    assert_eq!(check.component("tag_classifier").unwrap().status, ComponentStatus::Warning);
    assert_eq!(check.overall_score, 0.75);
    assert_eq!(check.status, ComponentStatus::Warning);
    assert_eq!(check.metrics.get("content_pipeline.runs_total"), Some(&1.0));
    assert!(check.alerts.is_empty());
    assert_eq!(h.flow.throttle().state(), ThrottleState::Open);
    // fresh validation results survive the sweep
    assert!(!h.flow.pipeline().cache().is_empty().await);
}

#[tokio::test]
async fn test_health_check_evicts_expired_validations() {
    let mut config = config();
    config.orchestrator.validation_cache_ttl_secs = 0;
    let h = harness_with(config, AiProvider::Unavailable);
    h.flow.run(&changelog_for("pu-1")).await;
    assert!(h.flow.pipeline().cache().len().await > 0);

    h.flow.check_health().await;
    assert!(h.flow.pipeline().cache().is_empty().await);
}

#[tokio::test]
async fn test_monitor_lifecycle_through_contentflow() {
    let h = harness();
    h.flow.start_monitoring();
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    h.flow.shutdown().await;
    assert!(h.flow.monitor().cycles() >= 1);
    assert!(h.flow.monitor().last_check().is_some());
}
