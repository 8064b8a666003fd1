//! Wiring: one pipeline, its components, the monitor and the shared event bus
use cflow_classifier::TagDetector;
use cflow_core::{
    AiProvider, ContentRequest, EventBus, HealthProbe, PipelineEvent, RecordStore, Result, ThrottleHandle,
    WorkflowStore,
};
use cflow_generation::GenerationEngine;
use cflow_monitor::{HealthCheck, PipelineMonitor};
use cflow_template::TemplateRegistry;
use cflow_validator::TemplateValidator;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ContentflowConfig;
use crate::pipeline::ContentPipeline;
use crate::report::{BatchReport, PipelineRun};

pub struct Contentflow {
    config: ContentflowConfig,
    bus: EventBus,
    throttle: ThrottleHandle,
    pipeline: Arc<ContentPipeline>,
    monitor: Arc<PipelineMonitor>,
}

impl Contentflow {
    /// Build every component from `config` and register their health
    /// probes with the monitor. The monitor is not started.
    pub fn new(
        config: ContentflowConfig,
        records: Arc<dyn RecordStore>,
        workflows: Arc<dyn WorkflowStore>,
        provider: AiProvider,
    ) -> Result<Self> {
        let bus = EventBus::default();
        let throttle = ThrottleHandle::new();

        let mut registry = TemplateRegistry::with_builtins()?;
        for path in &config.orchestrator.template_files {
            let loaded = registry.load_file(path)?;
            info!(path = %path.display(), templates = loaded, "templates loaded");
        }

        let engine = Arc::new(GenerationEngine::with_registry(
            registry,
            records,
            provider.clone(),
            config.generation.clone(),
        ));
        let detector = Arc::new(TagDetector::new(config.classifier.clone(), provider));
        let validator = Arc::new(TemplateValidator::with_detector(
            config.validation.clone(),
            TagDetector::new(config.classifier.clone(), AiProvider::Unavailable),
        ));
        let pipeline = Arc::new(ContentPipeline::new(
            config.orchestrator.clone(),
            Arc::clone(&engine),
            Arc::clone(&validator),
            Arc::clone(&detector),
            workflows,
            bus.clone(),
            throttle.clone(),
        ));

        let monitor = Arc::new(PipelineMonitor::new(config.monitor.clone(), bus.clone(), throttle.clone())?);
        let probes: [Arc<dyn HealthProbe>; 4] = [
            Arc::clone(&pipeline) as Arc<dyn HealthProbe>,
            engine,
            validator,
            detector,
        ];
        for probe in probes {
            monitor.register(probe);
        }

        Ok(Self {
            config,
            bus,
            throttle,
            pipeline,
            monitor,
        })
    }

    pub fn config(&self) -> &ContentflowConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<ContentPipeline> {
        &self.pipeline
    }

    pub fn monitor(&self) -> &Arc<PipelineMonitor> {
        &self.monitor
    }

    pub fn throttle(&self) -> &ThrottleHandle {
        &self.throttle
    }

    pub fn events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.bus.subscribe()
    }

    pub async fn run(&self, request: &ContentRequest) -> PipelineRun {
        self.pipeline.execute_content_pipeline(request).await
    }

    pub async fn run_batch(&self, requests: Vec<ContentRequest>) -> BatchReport {
        self.pipeline.execute_batch(requests).await
    }

    /// One monitor cycle outside the background loop
    pub async fn check_health(&self) -> HealthCheck {
        self.monitor.run_cycle().await
    }

    pub fn start_monitoring(&self) {
        self.monitor.start();
    }

    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        info!(stats = ?self.pipeline.stats(), "contentflow shut down");
    }
}
