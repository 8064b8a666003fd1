//! Contentflow Generation: turns a template plus source records into content
//!
//! Rendering is always template-first. When an AI provider is configured the
//! rendered draft is handed to it for polishing; any provider failure or
//! empty completion falls back to the draft.

pub mod config;
pub mod engine;
pub mod format;
pub mod metrics;
pub mod variables;

pub use config::GenerationConfig;
pub use engine::{gather_records, rewrite_prompt, GatheredData, GenerationEngine, GenerationOutcome};
pub use format::to_format;
pub use metrics::{compute_metrics, duplication, engagement, quality, readability, MetricsAggregator, QualityTrend};
pub use variables::{extract_variables, metric_label, record_variables, VariableSet};
