//! Generation engine: template resolution, variable extraction, AI or
//! template rendering and content metrics.
use async_trait::async_trait;
use cflow_core::{
    content_hash, word_count, AiProvider, CflowError, ContentRequest, DataSourceFilter, GeneratedContent,
    HealthProbe, ProbeReport, QualityMetrics, RecordStore, Result, SourceRecord, Template, TemplateType,
};
use cflow_template::{TemplateRegistry, TemplateRenderer};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::GenerationConfig;
use crate::format::to_format;
use crate::metrics::{compute_metrics, MetricsAggregator, QualityTrend};
use crate::variables::{extract_variables, VariableSet};

/// Result of a standalone generation call
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub success: bool,
    pub content: Option<GeneratedContent>,
    pub quality_metrics: Option<QualityMetrics>,
    pub error: Option<String>,
    /// Data sources that could not be read
    pub source_errors: Vec<String>,
}

/// Records fetched for one request
#[derive(Debug, Clone, Default)]
pub struct GatheredData {
    pub records: Vec<SourceRecord>,
    pub errors: Vec<String>,
    pub sources_requested: usize,
    pub sources_succeeded: usize,
    /// Successful sources that returned at least one record
    pub sources_nonempty: usize,
}

/// Fetch every data source of a request. A failing source is recorded and
/// skipped.
pub async fn gather_records(store: &dyn RecordStore, sources: &[DataSourceFilter]) -> GatheredData {
    let mut gathered = GatheredData {
        sources_requested: sources.len(),
        ..Default::default()
    };

    for filter in sources {
        match store.fetch(filter.source_type, filter).await {
            Ok(records) => {
                debug!(source = %filter.source_type, count = records.len(), "records fetched");
                gathered.sources_succeeded += 1;
                if !records.is_empty() {
                    gathered.sources_nonempty += 1;
                }
                gathered.records.extend(records);
            }
            Err(e) => {
                warn!(source = %filter.source_type, error = %e, "data source failed");
                gathered.errors.push(format!("{}: {}", filter.source_type, e));
            }
        }
    }
    gathered
}

pub struct GenerationEngine {
    registry: RwLock<TemplateRegistry>,
    renderer: TemplateRenderer,
    store: Arc<dyn RecordStore>,
    provider: AiProvider,
    config: GenerationConfig,
    aggregator: MetricsAggregator,
    generations: AtomicU64,
    failures: AtomicU64,
    ai_generations: AtomicU64,
    ai_fallbacks: AtomicU64,
}

impl GenerationEngine {
    /// Engine over the built-in template set
    pub fn new(store: Arc<dyn RecordStore>, provider: AiProvider, config: GenerationConfig) -> Result<Self> {
        Ok(Self::with_registry(TemplateRegistry::with_builtins()?, store, provider, config))
    }

    pub fn with_registry(
        registry: TemplateRegistry,
        store: Arc<dyn RecordStore>,
        provider: AiProvider,
        config: GenerationConfig,
    ) -> Self {
        let aggregator = MetricsAggregator::new(config.quality_window, config.trend_delta);
        Self {
            registry: RwLock::new(registry),
            renderer: TemplateRenderer::new(),
            store,
            provider,
            config,
            aggregator,
            generations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            ai_generations: AtomicU64::new(0),
            ai_fallbacks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn provider(&self) -> &AiProvider {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub fn register_template(&self, template: Template) -> Result<()> {
        self.registry.write().unwrap_or_else(|e| e.into_inner()).register(template)
    }

    pub fn template(&self, id: &str) -> Result<Template> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(id)
            .cloned()
    }

    /// Every template of a type, custom ones first
    pub fn templates_for(&self, content_type: TemplateType) -> Vec<Template> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_type(content_type)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Template named by the request, or the preferred one for its type
    pub fn resolve_template(&self, request: &ContentRequest) -> Result<Template> {
        match (&request.template_id, request.content_type) {
            (Some(id), _) => self.template(id),
            (None, Some(content_type)) => self
                .templates_for(content_type)
                .into_iter()
                .next()
                .ok_or_else(|| CflowError::TemplateNotFound(format!("no template for {}", content_type))),
            (None, None) => Err(CflowError::InputValidation(
                "request names neither a template_id nor a content_type".into(),
            )),
        }
    }

    pub async fn gather(&self, request: &ContentRequest) -> GatheredData {
        gather_records(self.store.as_ref(), &request.data_sources).await
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Standalone entry point: resolve, gather, generate. Never errors;
    /// failures are reported in the outcome.
    #[instrument(skip_all, fields(template_id = ?request.template_id, content_type = ?request.content_type))]
    pub async fn generate_content(&self, request: &ContentRequest) -> GenerationOutcome {
        let template = match self.resolve_template(request) {
            Ok(t) => t,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return GenerationOutcome::failed(e, Vec::new());
            }
        };

        let gathered = self.gather(request).await;
        match self.generate_from(&template, &gathered.records, request).await {
            Ok(content) => GenerationOutcome {
                success: true,
                quality_metrics: Some(content.quality_metrics),
                content: Some(content),
                error: None,
                source_errors: gathered.errors,
            },
            Err(e) => GenerationOutcome::failed(e, gathered.errors),
        }
    }

    /// Orchestrator entry point: records are already gathered
    pub async fn generate_from(
        &self,
        template: &Template,
        records: &[SourceRecord],
        request: &ContentRequest,
    ) -> Result<GeneratedContent> {
        let result = self.build_content(template, records, request).await;
        match &result {
            Ok(content) => {
                self.generations.fetch_add(1, Ordering::Relaxed);
                self.aggregator.record(content.quality_metrics.quality_score);
                info!(
                    template_id = %template.id,
                    words = content.word_count,
                    ai = content.ai_generated,
                    quality = content.quality_metrics.quality_score,
                    "content generated"
                );
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(template_id = %template.id, error = %e, "generation failed");
            }
        }
        result
    }

    async fn build_content(
        &self,
        template: &Template,
        records: &[SourceRecord],
        request: &ContentRequest,
    ) -> Result<GeneratedContent> {
        let audience = request
            .target_audience
            .clone()
            .or_else(|| template.target_audience.clone());
        let variables = extract_variables(template, records, &request.custom_variables, audience.as_deref());
        if !variables.unresolved.is_empty() {
            debug!(unresolved = ?variables.unresolved, "variables left empty");
        }

        let draft = self.renderer.render(template, &variables.to_value())?;

        let (markdown, ai_generated) = match self.ai_rewrite(template, &variables, &draft, audience.as_deref()).await {
            Some(text) => (text, true),
            None => (draft, false),
        };

        let body = to_format(&markdown, request.content_format);
        if body.trim().is_empty() {
            return Err(CflowError::Render(format!("template {} rendered an empty body", template.id)));
        }

        let title = variables
            .get_str("title")
            .or_else(|| variables.get_str("headline"))
            .unwrap_or(template.name.as_str())
            .to_string();

        Ok(GeneratedContent {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            content_title: title,
            quality_metrics: compute_metrics(&body, template.template_type),
            word_count: word_count(&body),
            content_hash: content_hash(&body),
            body,
            content_type: template.template_type,
            target_audience: audience,
            variables_used: variables.used,
            ai_generated,
            generated_at: Utc::now(),
        })
    }

    /// Ask the provider to polish a rendered draft. `None` means use the
    /// draft: AI disabled, unavailable, failing or answering with nothing.
    async fn ai_rewrite(
        &self,
        template: &Template,
        variables: &VariableSet,
        draft: &str,
        audience: Option<&str>,
    ) -> Option<String> {
        if !self.config.use_ai || !self.provider.is_available() {
            return None;
        }
        self.complete(&rewrite_prompt(template, variables, draft, audience)).await
    }

    /// Ask the provider to revise content against reviewer notes.
    ///
    /// Returns a new artifact; the original is left untouched.
    pub async fn revise(&self, content: &GeneratedContent, notes: &[String]) -> Option<GeneratedContent> {
        if !self.provider.is_available() {
            return None;
        }

        let prompt = format!(
            "Revise this {label} so it resolves every issue listed. Change as \
             little as possible and keep the markdown structure.\n\nIssues:\n{issues}\n\n\
             Content:\n{body}",
            label = content.content_type.label().to_lowercase(),
            issues = notes.iter().map(|n| format!("- {}", n)).collect::<Vec<_>>().join("\n"),
            body = content.body
        );
        let text = self.complete(&prompt).await?;
        let metrics = compute_metrics(&text, content.content_type);
        let mut revised = content.with_body(text, metrics);
        revised.ai_generated = true;
        Some(revised)
    }

    async fn complete(&self, prompt: &str) -> Option<String> {
        let options = self.config.completion_options();
        match self
            .provider
            .complete_with_timeout(prompt, &options, self.config.ai_timeout())
            .await
        {
            Ok(text) if word_count(&text) >= self.config.min_ai_words => {
                self.ai_generations.fetch_add(1, Ordering::Relaxed);
                Some(format!("{}\n", text.trim()))
            }
            Ok(_) => {
                self.ai_fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(provider = self.provider.name(), "empty completion, using template output");
                None
            }
            Err(e) => {
                self.ai_fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(provider = self.provider.name(), error = %e, "completion failed, using template output");
                None
            }
        }
    }

    pub fn average_quality(&self) -> Option<f64> {
        self.aggregator.average()
    }

    pub fn quality_trend(&self) -> QualityTrend {
        self.aggregator.trend()
    }
}

impl GenerationOutcome {
    fn failed(error: CflowError, source_errors: Vec<String>) -> Self {
        Self {
            success: false,
            content: None,
            quality_metrics: None,
            error: Some(error.to_string()),
            source_errors,
        }
    }
}

#[async_trait]
impl HealthProbe for GenerationEngine {
    fn component(&self) -> &str {
        "generation_engine"
    }

    async fn probe(&self) -> Result<ProbeReport> {
        let rendered = self
            .renderer
            .render_str("{{#if ok}}{{name}}{{/if}}", &json!({"ok": true, "name": "canary"}))?;
        if rendered != "canary" {
            return Ok(ProbeReport::unhealthy(format!("renderer produced {:?}", rendered)));
        }
        if self.registry.read().unwrap_or_else(|e| e.into_inner()).is_empty() {
            return Ok(ProbeReport::unhealthy("no templates registered"));
        }
        Ok(ProbeReport::healthy())
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("generations_total".into(), self.generations.load(Ordering::Relaxed) as f64);
        m.insert("generation_failures_total".into(), self.failures.load(Ordering::Relaxed) as f64);
        m.insert("ai_generations_total".into(), self.ai_generations.load(Ordering::Relaxed) as f64);
        m.insert("ai_fallbacks_total".into(), self.ai_fallbacks.load(Ordering::Relaxed) as f64);
        if let Some(avg) = self.average_quality() {
            m.insert("average_content_quality".into(), avg);
        }
        m.insert("quality_trend".into(), self.quality_trend().as_f64());
        m
    }
}

/// Prompt for the AI path: the template source, the resolved variables,
/// the audience and the template-only draft as a baseline.
pub fn rewrite_prompt(template: &Template, variables: &VariableSet, draft: &str, audience: Option<&str>) -> String {
    format!(
        "Write a polished {label} for {audience}. Follow the structure of the \
         template and use the variables it was filled with. Keep every heading, \
         name, figure and quote. Do not add statistics or claims that are not in \
         the variables. Reply with markdown only.\n\n\
         Template:\n{source}\n\n\
         Variables:\n{values}\n\n\
         Draft:\n{draft}",
        label = template.template_type.label().to_lowercase(),
        audience = audience.unwrap_or("a general business audience"),
        source = template.template_content.trim_end(),
        values = variables.to_value(),
        draft = draft
    )
}
