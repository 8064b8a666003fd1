//! Contentflow Monitor
//!
//! Polls every registered [`cflow_core::HealthProbe`] on a fixed interval,
//! flattens probe metrics, checks them against threshold rules and publishes
//! an `alert` event for each breach. The same cycle drives the shared
//! [`cflow_core::ThrottleHandle`] the orchestrator reads.

pub mod alerts;
pub mod config;
pub mod monitor;
pub mod registry;

pub use alerts::{evaluate_thresholds, AlertLog};
pub use config::{default_thresholds, Comparison, MonitorConfig, ThresholdRule};
pub use monitor::{
    overall_score, status_for_score, ComponentHealth, HealthCheck, MonitorState, PipelineMonitor, HEALTHY_SCORE,
    WARNING_SCORE,
};
pub use registry::MonitorMetrics;
