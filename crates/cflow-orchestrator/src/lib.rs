//! Contentflow Orchestrator
//!
//! Drives a content request through the run stages: request validation,
//! data gathering, insight derivation, template selection, generation,
//! output validation with one bounded enhancement, and the approval
//! workflow. [`Contentflow`] wires the pipeline to the monitor.
//!
//! # Example
//!
//! ```ignore
//! use cflow_core::{AiProvider, ContentRequest, InMemoryRecordStore, InMemoryWorkflowStore, TemplateType};
//! use cflow_orchestrator::{Contentflow, ContentflowConfig};
//! use std::sync::Arc;
//!
//! let flow = Contentflow::new(
//!     ContentflowConfig::default(),
//!     Arc::new(InMemoryRecordStore::new()),
//!     Arc::new(InMemoryWorkflowStore::new()),
//!     AiProvider::Unavailable,
//! )?;
//! let run = flow.run(&ContentRequest::for_type(TemplateType::ChangelogEntry)).await;
//! ```

pub mod approval;
pub mod config;
pub mod contentflow;
pub mod insights;
pub mod pipeline;
pub mod report;
pub mod selection;

pub use approval::{approval_steps, workflow_request};
pub use config::{ContentflowConfig, OrchestratorConfig, SlaTable};
pub use contentflow::Contentflow;
pub use insights::{build_insights, derive_insights, ContentInsights, ContentOpportunity};
pub use pipeline::{validate_request, ContentPipeline, PipelineStats};
pub use report::{data_quality_score, BatchReport, EnhancementReport, PipelineRun};
pub use selection::{compare_candidates, select_template, validate_cached, CandidateScore, TemplateSelection};
