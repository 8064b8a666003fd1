//! Content pipeline: one request from validation to approval workflow
//!
//! Every run walks the stage machine in [`cflow_core::RunStage`]. A failure
//! at any stage ends the run in `failed` with whatever was produced so far;
//! nothing escapes as an error or a panic. Enhancement happens at most once
//! per run: deterministic fixes, an optional AI revision, one re-validation.

use async_trait::async_trait;
use cflow_classifier::TagDetector;
use cflow_core::{
    CflowError, ContentRequest, EventBus, GeneratedContent, HealthProbe, PipelineEvent, ProbeReport, Result,
    RunStage, StageRecorder, ThrottleHandle, ThrottleState, WorkflowStore,
};
use cflow_generation::{compute_metrics, GenerationEngine, MetricsAggregator};
use cflow_validator::{apply_fixes, TemplateValidator, ValidationCache, ValidationResult, ValidationTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn, Span};

use crate::approval::workflow_request;
use crate::config::OrchestratorConfig;
use crate::insights::derive_insights;
use crate::report::{data_quality_score, BatchReport, EnhancementReport, PipelineRun};
use crate::selection::select_template;

/// Runs before the pipeline judges its own error rate
const MIN_RUNS_FOR_HEALTH: u64 = 5;
/// Error rate above which the pipeline reports a warning
const WARNING_ERROR_RATE: f64 = 0.5;

#[derive(Debug, Default)]
struct RunCounters {
    runs: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    enhancements: AtomicU64,
    recovered: AtomicU64,
    total_ms: AtomicU64,
}

/// Snapshot of pipeline counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub runs_total: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub enhancements_attempted: u64,
    /// Enhancements that turned a failing run into a passing one
    pub enhancements_recovered: u64,
    pub average_run_ms: f64,
    pub average_quality: Option<f64>,
}

impl PipelineStats {
    pub fn error_rate(&self) -> f64 {
        if self.runs_total == 0 {
            0.0
        } else {
            self.failed_runs as f64 / self.runs_total as f64
        }
    }
}

pub struct ContentPipeline {
    config: OrchestratorConfig,
    engine: Arc<GenerationEngine>,
    validator: Arc<TemplateValidator>,
    detector: Arc<TagDetector>,
    workflows: Arc<dyn WorkflowStore>,
    cache: ValidationCache,
    bus: EventBus,
    throttle: ThrottleHandle,
    quality: MetricsAggregator,
    counters: RunCounters,
}

impl ContentPipeline {
    pub fn new(
        config: OrchestratorConfig,
        engine: Arc<GenerationEngine>,
        validator: Arc<TemplateValidator>,
        detector: Arc<TagDetector>,
        workflows: Arc<dyn WorkflowStore>,
        bus: EventBus,
        throttle: ThrottleHandle,
    ) -> Self {
        Self {
            cache: ValidationCache::new(config.validation_cache_ttl()),
            quality: MetricsAggregator::new(config.quality_window, 0.05),
            config,
            engine,
            validator,
            detector,
            workflows,
            bus,
            throttle,
            counters: RunCounters::default(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<GenerationEngine> {
        &self.engine
    }

    pub fn validator(&self) -> &Arc<TemplateValidator> {
        &self.validator
    }

    pub fn detector(&self) -> &Arc<TagDetector> {
        &self.detector
    }

    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    pub fn throttle(&self) -> &ThrottleHandle {
        &self.throttle
    }

    pub fn stats(&self) -> PipelineStats {
        let runs = self.counters.runs.load(Ordering::Relaxed);
        PipelineStats {
            runs_total: runs,
            successful_runs: self.counters.succeeded.load(Ordering::Relaxed),
            failed_runs: self.counters.failed.load(Ordering::Relaxed),
            enhancements_attempted: self.counters.enhancements.load(Ordering::Relaxed),
            enhancements_recovered: self.counters.recovered.load(Ordering::Relaxed),
            average_run_ms: if runs == 0 {
                0.0
            } else {
                self.counters.total_ms.load(Ordering::Relaxed) as f64 / runs as f64
            },
            average_quality: self.quality.average(),
        }
    }

    // ------------------------------------------------------------------
    // Single run
    // ------------------------------------------------------------------

    #[instrument(
        skip_all,
        fields(
            pipeline_id = tracing::field::Empty,
            template_id = ?request.template_id,
            content_type = ?request.content_type
        )
    )]
    pub async fn execute_content_pipeline(&self, request: &ContentRequest) -> PipelineRun {
        let pipeline_id = uuid::Uuid::new_v4().to_string();
        Span::current().record("pipeline_id", pipeline_id.as_str());

        let mut recorder = StageRecorder::new(pipeline_id.clone());
        let mut run = PipelineRun::started(pipeline_id);

        let outcome = self.drive(request, &mut recorder, &mut run).await;
        if let Err(e) = &outcome {
            run.failed_at = Some(recorder.current());
            run.error = Some(e.to_string());
            run.error_kind = Some(e.kind().to_string());
            recorder.fail();
        }

        let (stage, performance) = recorder.finish();
        run.stage = stage;
        run.success = stage == RunStage::Done;
        run.performance = performance;

        self.record_run(&run);
        self.bus.publish(PipelineEvent::PipelineCompleted {
            pipeline_id: run.pipeline_id.clone(),
            success: run.success,
            quality_score: run.quality_score(),
            duration_ms: run.performance.total_ms,
            reason: run.error.clone(),
        });

        if run.success {
            info!(
                template_id = ?run.template_id,
                quality = ?run.quality_score(),
                total_ms = run.performance.total_ms,
                "pipeline run complete"
            );
        } else {
            warn!(
                failed_at = ?run.failed_at,
                error = ?run.error,
                "pipeline run failed"
            );
        }
        run
    }

    async fn drive(&self, request: &ContentRequest, recorder: &mut StageRecorder, run: &mut PipelineRun) -> Result<()> {
        // validating_request
        if self.throttle.is_halted() {
            return Err(CflowError::ComponentUnhealthy {
                component: "pipeline_monitor".into(),
                reason: "pipeline halted after a critical alert".into(),
            });
        }
        validate_request(request)?;
        advance(recorder, RunStage::GatheringData)?;

        // gathering_data
        let gathered = self.engine.gather(request).await;
        run.data_quality_score = data_quality_score(&gathered, !request.custom_variables.is_empty());
        run.source_errors = gathered.errors.clone();
        debug!(
            records = gathered.records.len(),
            source_errors = gathered.errors.len(),
            data_quality = run.data_quality_score,
            "context gathered"
        );
        advance(recorder, RunStage::DerivingInsights)?;

        // deriving_insights
        let insights = derive_insights(&self.detector, &gathered.records, request, self.config.insight_threshold).await;
        run.insights = Some(insights.clone());
        advance(recorder, RunStage::SelectingTemplate)?;

        // selecting_template
        let selection = select_template(&self.engine, &self.validator, &self.cache, request, &insights).await?;
        run.template_id = Some(selection.template.id.clone());
        run.candidates = selection.candidates.clone();
        advance(recorder, RunStage::GeneratingContent)?;

        // generating_content
        let content = self
            .engine
            .generate_from(&selection.template, &gathered.records, request)
            .await?;
        run.content = Some(content.clone());
        advance(recorder, RunStage::ValidatingOutput)?;

        // validating_output
        let validation = self.validator.validate(&ValidationTarget::from_content(&content))?;
        run.validation = Some(validation.clone());

        let blocking = if validation.passed { Vec::new() } else { validation.unfixable_critical_issues() };
        let (content, validation) = if validation.passed {
            (content, validation)
        } else if !blocking.is_empty() {
            self.quality.record(validation.overall_score);
            warn!(issues = blocking.len(), "critical issues without a fix, skipping enhancement");
            return Err(CflowError::ValidationFailure(format!(
                "needs human review, critical issues without an automatic fix: {}",
                blocking.join("; ")
            )));
        } else if self.config.enhancement_enabled {
            advance(recorder, RunStage::EnhancingContent)?;
            let (enhanced, revalidated, report) = self.enhance(&content, &validation).await?;
            let recovered = report.passed;
            run.content = Some(enhanced.clone());
            run.validation = Some(revalidated.clone());
            run.enhancement = Some(report);
            if !recovered {
                self.quality.record(revalidated.overall_score);
                return Err(CflowError::ValidationFailure(format!(
                    "content still failing after enhancement: {}",
                    revalidated.summary
                )));
            }
            self.counters.recovered.fetch_add(1, Ordering::Relaxed);
            (enhanced, revalidated)
        } else {
            self.quality.record(validation.overall_score);
            return Err(CflowError::ValidationFailure(validation.summary.clone()));
        };
        self.quality.record(validation.overall_score);
        advance(recorder, RunStage::CreatingWorkflow)?;

        // creating_workflow
        let entity = serde_json::to_value(&content).map_err(|e| CflowError::Store(e.to_string()))?;
        run.persisted_id = Some(self.engine.store().persist("generated_content", entity).await?);

        if request.approval_required {
            let workflow = workflow_request(&content, request.priority, &self.config.sla_hours);
            let steps = workflow.steps.clone();
            let reviewers = workflow.reviewers.clone();
            let workflow_id = self.workflows.create_workflow(workflow).await?;
            info!(workflow_id = %workflow_id, steps = steps.len(), "approval workflow created");
            self.bus.publish(PipelineEvent::ApprovalRequest {
                workflow_id: workflow_id.clone(),
                content_id: content.id.clone(),
                content_type: content.content_type,
                content_title: content.content_title.clone(),
                steps,
                reviewers,
            });
            run.workflow_id = Some(workflow_id);
        }
        advance(recorder, RunStage::Done)?;
        Ok(())
    }

    /// The single enhancement attempt. Only reached when every failed
    /// critical rule has deterministic fixes; the AI pass sees non-critical
    /// notes only.
    async fn enhance(
        &self,
        content: &GeneratedContent,
        validation: &ValidationResult,
    ) -> Result<(GeneratedContent, ValidationResult, EnhancementReport)> {
        self.counters.enhancements.fetch_add(1, Ordering::Relaxed);

        let fixes = validation.fixes();
        let mut candidate = if fixes.is_empty() {
            content.clone()
        } else {
            let body = apply_fixes(&content.body, &fixes);
            let metrics = compute_metrics(&body, content.content_type);
            content.with_body(body, metrics)
        };

        let mut ai_revised = false;
        if self.config.ai_enhancement {
            let notes = validation.revisable_issues();
            if !notes.is_empty() {
                if let Some(revised) = self.engine.revise(&candidate, &notes).await {
                    candidate = revised;
                    ai_revised = true;
                }
            }
        }

        let revalidated = self.validator.validate(&ValidationTarget::from_content(&candidate))?;
        debug!(
            fixes = fixes.len(),
            ai_revised,
            before = validation.overall_score,
            after = revalidated.overall_score,
            passed = revalidated.passed,
            "enhancement pass finished"
        );

        let report = EnhancementReport {
            fixes_applied: fixes,
            ai_revised,
            score_before: validation.overall_score,
            score_after: revalidated.overall_score,
            passed: revalidated.passed,
        };
        Ok((candidate, revalidated, report))
    }

    fn record_run(&self, run: &PipelineRun) {
        self.counters.runs.fetch_add(1, Ordering::Relaxed);
        self.counters.total_ms.fetch_add(run.performance.total_ms, Ordering::Relaxed);
        if run.success {
            self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    /// Parallel runs allowed right now; one while the monitor throttles
    pub fn batch_concurrency(&self) -> usize {
        match self.throttle.state() {
            ThrottleState::Open => self.config.max_concurrency.max(1),
            ThrottleState::Throttled | ThrottleState::Halted => 1,
        }
    }

    /// Run every request with bounded parallelism. Items fail independently;
    /// a panicking run is reported as an aborted item. Reports keep request
    /// order.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub async fn execute_batch(self: &Arc<Self>, requests: Vec<ContentRequest>) -> BatchReport {
        let batch_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let concurrency = self.batch_concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        info!(batch_id = %batch_id, concurrency, "batch started");

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            let pipeline = Arc::clone(self);
            let sem = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                pipeline.execute_content_pipeline(&request).await
            }));
        }

        let mut runs = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(run) => runs.push(run),
                Err(join_err) => {
                    warn!(batch_id = %batch_id, index, error = %join_err, "batch item aborted");
                    let aborted = PipelineRun::aborted(format!("batch item {} aborted: {}", index, join_err));
                    self.record_run(&aborted);
                    runs.push(aborted);
                }
            }
        }

        let report = BatchReport::from_runs(batch_id, runs, started.elapsed());
        info!(
            batch_id = %report.batch_id,
            successful = report.successful_requests,
            failed = report.failed_requests,
            total_ms = report.total_time_ms,
            "batch finished"
        );
        report
    }
}

fn advance(recorder: &mut StageRecorder, next: RunStage) -> Result<()> {
    recorder
        .advance(next)
        .map_err(|e| CflowError::Workflow(e.to_string()))
}

/// Shape checks done before any side effect
pub fn validate_request(request: &ContentRequest) -> Result<()> {
    match (&request.template_id, request.content_type) {
        (Some(_), Some(_)) => {
            return Err(CflowError::InputValidation(
                "request names both a template_id and a content_type".into(),
            ));
        }
        (None, None) => {
            return Err(CflowError::InputValidation(
                "request names neither a template_id nor a content_type".into(),
            ));
        }
        (Some(id), None) if id.trim().is_empty() => {
            return Err(CflowError::InputValidation("template_id is blank".into()));
        }
        _ => {}
    }

    for (idx, source) in request.data_sources.iter().enumerate() {
        if source.ids.iter().any(|id| id.trim().is_empty()) {
            return Err(CflowError::InputValidation(format!("data_sources[{}] has a blank id", idx)));
        }
        if source.limit == Some(0) {
            return Err(CflowError::InputValidation(format!("data_sources[{}].limit must be positive", idx)));
        }
        if source.filters.keys().any(|k| k.trim().is_empty()) {
            return Err(CflowError::InputValidation(format!("data_sources[{}] has a blank filter field", idx)));
        }
    }

    if request.custom_variables.keys().any(|k| k.trim().is_empty()) {
        return Err(CflowError::InputValidation("custom variable names must not be blank".into()));
    }
    Ok(())
}

#[async_trait]
impl HealthProbe for ContentPipeline {
    fn component(&self) -> &str {
        "content_pipeline"
    }

    async fn probe(&self) -> Result<ProbeReport> {
        // every monitor cycle doubles as the validation cache sweep
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            debug!(purged, "expired validation results evicted");
        }
        let stats = self.stats();
        if stats.runs_total >= MIN_RUNS_FOR_HEALTH && stats.error_rate() > WARNING_ERROR_RATE {
            return Ok(ProbeReport::warning(format!(
                "{} of {} runs failed",
                stats.failed_runs, stats.runs_total
            )));
        }
        Ok(ProbeReport::healthy())
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let stats = self.stats();
        let mut m = BTreeMap::new();
        m.insert("runs_total".into(), stats.runs_total as f64);
        m.insert("successful_runs".into(), stats.successful_runs as f64);
        m.insert("failed_runs".into(), stats.failed_runs as f64);
        m.insert("enhancements_total".into(), stats.enhancements_attempted as f64);
        m.insert("validation_cache_hits".into(), self.cache.hits() as f64);
        m.insert("validation_cache_misses".into(), self.cache.misses() as f64);
        m.insert("quality_trend".into(), self.quality.trend().as_f64());
        if stats.runs_total > 0 {
            m.insert("error_rate".into(), stats.error_rate());
            m.insert("average_run_ms".into(), stats.average_run_ms);
        }
        if let Some(quality) = stats.average_quality {
            m.insert("average_quality".into(), quality);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cflow_core::{DataSourceFilter, SourceType, TemplateType};

    #[test]
    fn test_request_needs_exactly_one_target() {
        let both = ContentRequest {
            template_id: Some("changelog-standard".into()),
            content_type: Some(TemplateType::ChangelogEntry),
            ..Default::default()
        };
        assert!(matches!(validate_request(&both), Err(CflowError::InputValidation(_))));
        assert!(matches!(
            validate_request(&ContentRequest::default()),
            Err(CflowError::InputValidation(_))
        ));
        assert!(validate_request(&ContentRequest::for_template(" ")).is_err());
        assert!(validate_request(&ContentRequest::for_type(TemplateType::BlogPost)).is_ok());
    }

    #[test]
    fn test_source_shape_checked() {
        let blank_id = ContentRequest::for_type(TemplateType::CaseStudy)
            .with_source(DataSourceFilter::new(SourceType::Meeting).with_ids(["mtg-1", ""]));
        assert!(validate_request(&blank_id).unwrap_err().to_string().contains("blank id"));

        let zero_limit = ContentRequest::for_type(TemplateType::CaseStudy)
            .with_source(DataSourceFilter::new(SourceType::Meeting).with_limit(0));
        assert!(validate_request(&zero_limit).is_err());
    }
}
