//! Threshold evaluation and the bounded alert history
use cflow_core::{Alert, AlertSeverity};
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::config::{Comparison, ThresholdRule};

/// Check every metric against every rule that applies to it.
///
/// A metric matched by several rules can raise several alerts. Metric
/// names of the form `component.metric` carry their component into the
/// alert.
pub fn evaluate_thresholds(rules: &[ThresholdRule], metrics: &BTreeMap<String, f64>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for (metric, &observed) in metrics {
        if !observed.is_finite() {
            continue;
        }
        for rule in rules.iter().filter(|r| r.applies_to(metric)) {
            if rule.is_breached(observed) {
                alerts.push(build_alert(rule, metric, observed));
            }
        }
    }
    alerts
}

fn build_alert(rule: &ThresholdRule, metric: &str, observed: f64) -> Alert {
    let direction = match rule.comparison {
        Comparison::Above => "above",
        Comparison::Below => "below",
    };
    Alert {
        id: uuid::Uuid::new_v4().to_string(),
        metric: metric.to_string(),
        observed,
        threshold: rule.threshold,
        severity: rule.severity,
        component: metric.split_once('.').map(|(component, _)| component.to_string()),
        message: format!("{} is {:.3}, {} threshold {}", metric, observed, direction, rule.threshold),
        raised_at: Utc::now(),
    }
}

/// Most recent alerts, oldest dropped first once `capacity` is reached
#[derive(Debug)]
pub struct AlertLog {
    capacity: usize,
    entries: Mutex<VecDeque<Alert>>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, alert: Alert) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(alert);
    }

    pub fn all(&self) -> Vec<Alert> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned().collect()
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn for_metric(&self, metric: &str) -> Vec<Alert> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().filter(|a| a.metric == metric).cloned().collect()
    }

    pub fn with_severity(&self, severity: AlertSeverity) -> Vec<Alert> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().filter(|a| a.severity == severity).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
