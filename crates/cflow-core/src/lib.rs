//! Contentflow Core: data model, run stages, collaborator traits and events
//!
//! Everything the pipeline crates share lives here. Nothing in this crate
//! knows about templates, validation rules or classification.

pub mod config;
pub mod data_model;
pub mod error;
pub mod events;
pub mod health;
pub mod memory;
pub mod providers;
pub mod runner;
pub mod stage;
pub mod telemetry;

pub use data_model::{
    content_hash, word_count, ContentFormat, ContentRequest, DataSourceFilter, GeneratedContent,
    InsightFields, MeetingFields, Priority, ProductUpdateFields, QualityMetrics, RecordKind,
    SignalFields, SourceRecord, SourceType, Template, TemplateType, VariableType,
};
pub use error::{CflowError, ProviderError, Result};
pub use events::{Alert, AlertSeverity, EventBus, PipelineEvent};
pub use health::{ComponentStatus, HealthProbe, ProbeReport, ThrottleHandle, ThrottleState};
pub use memory::{InMemoryRecordStore, InMemoryWorkflowStore};
pub use providers::{
    AiProvider, ApprovalStep, CompletionOptions, CompletionProvider, RecordStore, WorkflowRequest,
    WorkflowStore,
};
pub use runner::{PipelinePerformance, StageRecorder, StageTiming};
pub use stage::{RunStage, StageError};

/// Contentflow engine version
pub const CFLOW_VERSION: &str = "1.0.0";
