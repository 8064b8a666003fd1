//! Monitor settings and threshold rules
use cflow_core::{config, AlertSeverity, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Above,
    Below,
}

/// One alerting rule. `metric` may contain `*` wildcards, so
/// `*.error_rate` watches every component that reports an error rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
    #[serde(default = "default_severity")]
    pub severity: AlertSeverity,
}

fn default_severity() -> AlertSeverity {
    AlertSeverity::Warning
}

impl ThresholdRule {
    pub fn new(metric: impl Into<String>, comparison: Comparison, threshold: f64, severity: AlertSeverity) -> Self {
        Self {
            metric: metric.into(),
            comparison,
            threshold,
            severity,
        }
    }

    pub fn applies_to(&self, metric: &str) -> bool {
        if !self.metric.contains('*') {
            return self.metric == metric;
        }
        let pattern = format!("^{}$", regex::escape(&self.metric).replace(r"\*", ".*"));
        Regex::new(&pattern).map(|re| re.is_match(metric)).unwrap_or(false)
    }

    pub fn is_breached(&self, observed: f64) -> bool {
        match self.comparison {
            Comparison::Above => observed > self.threshold,
            Comparison::Below => observed < self.threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub thresholds: Vec<ThresholdRule>,
    /// Alerts kept for retrieval; older ones are dropped first
    pub alert_history: usize,
    /// Drop batch concurrency to one while the pipeline is unhealthy
    pub throttle_on_unhealthy: bool,
    /// Refuse new runs while a critical alert is active
    pub halt_on_critical: bool,
    /// Sample host memory through sysinfo each cycle
    pub system_metrics: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            probe_timeout_ms: 5_000,
            thresholds: default_thresholds(),
            alert_history: 500,
            throttle_on_unhealthy: true,
            halt_on_critical: false,
            system_metrics: true,
        }
    }
}

pub fn default_thresholds() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::new("memory_utilization", Comparison::Above, 0.8, AlertSeverity::Warning),
        ThresholdRule::new("*.response_time_ms", Comparison::Above, 5000.0, AlertSeverity::Warning),
        ThresholdRule::new("health_score", Comparison::Below, 0.6, AlertSeverity::Critical),
        ThresholdRule::new("*.error_rate", Comparison::Above, 0.1, AlertSeverity::Warning),
        ThresholdRule::new("*.average_quality", Comparison::Below, 0.7, AlertSeverity::Warning),
    ]
}

impl MonitorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}
