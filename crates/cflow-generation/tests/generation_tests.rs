use async_trait::async_trait;
use cflow_core::{
    AiProvider, CompletionOptions, CompletionProvider, ContentFormat, ContentRequest, DataSourceFilter,
    HealthProbe, InMemoryRecordStore, MeetingFields, ProductUpdateFields, ProviderError, RecordKind, SourceRecord,
    SourceType, TemplateType,
};
use cflow_generation::{GenerationConfig, GenerationEngine};
use std::sync::{Arc, Mutex};

fn records() -> Vec<SourceRecord> {
    vec![
        SourceRecord::new(
            "pu-1",
            "Sync now resumes after a dropped connection.",
            RecordKind::ProductUpdate(ProductUpdateFields {
                title: "Resumable sync".into(),
                product: Some("Contentflow".into()),
                version: Some("2.4".into()),
                features: vec!["Offline queue".into(), "Retry with backoff".into()],
                issue_key: Some("CF-101".into()),
            }),
        ),
        SourceRecord::new(
            "mtg-1",
            "Quarterly review with Acme.",
            RecordKind::Meeting(MeetingFields {
                title: "Acme quarterly review".into(),
                customer_name: Some("Dana Wu".into()),
                company: Some("Acme".into()),
                key_quotes: vec!["Our writers publish twice as often.".into()],
                ..Default::default()
            }),
        ),
    ]
}

fn engine(provider: AiProvider) -> GenerationEngine {
    GenerationEngine::new(
        Arc::new(InMemoryRecordStore::with_records(records())),
        provider,
        GenerationConfig::default(),
    )
    .unwrap()
}

fn changelog_request() -> ContentRequest {
    ContentRequest::for_type(TemplateType::ChangelogEntry)
        .with_source(DataSourceFilter::new(SourceType::ProductUpdate).with_ids(["pu-1"]))
}

struct FixedProvider(&'static str);

#[async_trait]
impl CompletionProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

struct BrokenProvider;

#[async_trait]
impl CompletionProvider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        Err(ProviderError::Failed("model overloaded".into()))
    }
}

#[tokio::test]
async fn test_template_only_generation() {
    let engine = engine(AiProvider::Unavailable);
    let outcome = engine.generate_content(&changelog_request()).await;

    assert!(outcome.success, "{:?}", outcome.error);
    let content = outcome.content.unwrap();
    assert_eq!(content.template_id, "changelog-standard");
    assert_eq!(content.content_title, "Resumable sync");
    assert!(!content.ai_generated);
    assert!(content.body.starts_with("## Resumable sync"));
    assert!(content.body.contains("- Offline queue"));
    assert!(content.body.contains("Version 2.4 of Contentflow is now available."));
    assert!(content.content_hash.starts_with("blake3:"));
    assert!(content.variables_used.contains(&"features".to_string()));
    assert!(!content.body.contains("{{"));
}

#[tokio::test]
async fn test_custom_variables_win() {
    let engine = engine(AiProvider::Unavailable);
    let request = changelog_request().with_variable("title", "Sync that survives flaky networks");
    let content = engine.generate_content(&request).await.content.unwrap();
    assert_eq!(content.content_title, "Sync that survives flaky networks");
    assert!(content.body.starts_with("## Sync that survives flaky networks"));
}

#[tokio::test]
async fn test_unknown_template_fails_outcome() {
    let engine = engine(AiProvider::Unavailable);
    let outcome = engine
        .generate_content(&ContentRequest::for_template("does-not-exist"))
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().starts_with("TEMPLATE/not found"));
    assert_eq!(engine.metrics()["generation_failures_total"], 1.0);
}

#[tokio::test]
async fn test_ai_output_used_when_available() {
    let engine = engine(AiProvider::new(Arc::new(FixedProvider(
        "## Resumable sync\n\nSync picks up where it left off after a dropped connection.",
    ))));
    let content = engine.generate_content(&changelog_request()).await.content.unwrap();
    assert!(content.ai_generated);
    assert!(content.body.contains("picks up where it left off"));
    assert_eq!(engine.metrics()["ai_generations_total"], 1.0);
}

/// Keeps every prompt it receives
struct RecordingProvider {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("## Resumable sync\n\nSync picks up where it left off after a dropped connection.".to_string())
    }
}

#[tokio::test]
async fn test_ai_prompt_carries_template_variables_and_audience() {
    let provider = Arc::new(RecordingProvider {
        prompts: Mutex::new(Vec::new()),
    });
    let engine = engine(AiProvider::new(provider.clone()));
    let request = changelog_request().with_audience("platform engineers");
    let content = engine.generate_content(&request).await.content.unwrap();
    assert!(content.ai_generated);

    let prompts = provider.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("for platform engineers"));
    // template source, not only the rendered draft
    assert!(prompt.contains("{{#each features}}"));
    assert!(prompt.contains("\"issue_key\":\"CF-101\""));
    assert!(prompt.contains("\"version\":\"2.4\""));
    assert!(prompt.contains("Draft:\n## Resumable sync"));
}

#[tokio::test]
async fn test_provider_failure_falls_back_to_template() {
    let engine = engine(AiProvider::new(Arc::new(BrokenProvider)));
    let outcome = engine.generate_content(&changelog_request()).await;
    assert!(outcome.success);
    assert!(!outcome.content.unwrap().ai_generated);
    assert_eq!(engine.metrics()["ai_fallbacks_total"], 1.0);
}

#[tokio::test]
async fn test_empty_completion_falls_back_to_template() {
    let engine = engine(AiProvider::new(Arc::new(FixedProvider("   "))));
    let content = engine.generate_content(&changelog_request()).await.content.unwrap();
    assert!(!content.ai_generated);
    assert!(content.body.contains("- Retry with backoff"));
}

#[tokio::test]
async fn test_html_output() {
    let engine = engine(AiProvider::Unavailable);
    let mut request = changelog_request();
    request.content_format = ContentFormat::Html;
    let content = engine.generate_content(&request).await.content.unwrap();
    assert!(content.body.starts_with("<h2>Resumable sync</h2>"));
    assert!(content.body.contains("<li>Offline queue</li>"));
}

#[tokio::test]
async fn test_case_study_from_meeting() {
    let engine = engine(AiProvider::Unavailable);
    let request = ContentRequest::for_template("case-study-standard")
        .with_source(DataSourceFilter::new(SourceType::Meeting).with_filter("company", "acme"));
    let outcome = engine.generate_content(&request).await;
    let content = outcome.content.unwrap();
    assert!(content.body.contains("## About Acme"));
    assert!(content.body.contains("> Our writers publish twice as often."));
    assert!(content.quality_metrics.engagement_prediction > 0.4);
}

#[tokio::test]
async fn test_revise_requires_provider() {
    let engine = engine(AiProvider::Unavailable);
    let content = engine.generate_content(&changelog_request()).await.content.unwrap();
    assert!(engine.revise(&content, &["too short".into()]).await.is_none());

    let engine = self::engine(AiProvider::new(Arc::new(FixedProvider(
        "## Resumable sync\n\nA longer revised body that explains the change in detail.",
    ))));
    let revised = engine.revise(&content, &["too short".into()]).await.unwrap();
    assert_ne!(revised.id, content.id);
    assert_ne!(revised.content_hash, content.content_hash);
    assert!(revised.ai_generated);
}

#[tokio::test]
async fn test_probe_healthy() {
    let engine = engine(AiProvider::Unavailable);
    assert_eq!(
        engine.probe().await.unwrap().status,
        cflow_core::ComponentStatus::Healthy
    );
}
