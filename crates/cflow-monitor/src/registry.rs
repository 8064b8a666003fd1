//! Prometheus registry for monitor observations.
use cflow_core::{AlertSeverity, CflowError, Result};
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::monitor::HealthCheck;

fn metrics_err(e: prometheus::Error) -> CflowError {
    CflowError::Config(format!("metrics registry: {}", e))
}

pub struct MonitorMetrics {
    registry: Registry,
    health_score: Gauge,
    memory_utilization: Gauge,
    component_up: GaugeVec,
    component_response_ms: GaugeVec,
    component_metric: GaugeVec,
    checks_total: IntCounter,
    alerts_total: IntCounterVec,
}

impl MonitorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let health_score = Gauge::new("cflow_health_score", "Fraction of healthy components").map_err(metrics_err)?;
        let memory_utilization =
            Gauge::new("cflow_memory_utilization", "Used over total system memory").map_err(metrics_err)?;
        let component_up = GaugeVec::new(
            Opts::new("cflow_component_up", "Probe score: 1 healthy, 0.5 warning, 0 unhealthy"),
            &["component"],
        )
        .map_err(metrics_err)?;
        let component_response_ms = GaugeVec::new(
            Opts::new("cflow_component_response_time_ms", "Probe round trip in milliseconds"),
            &["component"],
        )
        .map_err(metrics_err)?;
        let component_metric = GaugeVec::new(
            Opts::new("cflow_component_metric", "Numeric metrics reported by component probes"),
            &["component", "metric"],
        )
        .map_err(metrics_err)?;
        let checks_total =
            IntCounter::new("cflow_health_checks_total", "Completed monitor cycles").map_err(metrics_err)?;
        let alerts_total = IntCounterVec::new(
            Opts::new("cflow_alerts_total", "Alerts raised by severity"),
            &["severity"],
        )
        .map_err(metrics_err)?;

        registry.register(Box::new(health_score.clone())).map_err(metrics_err)?;
        registry.register(Box::new(memory_utilization.clone())).map_err(metrics_err)?;
        registry.register(Box::new(component_up.clone())).map_err(metrics_err)?;
        registry.register(Box::new(component_response_ms.clone())).map_err(metrics_err)?;
        registry.register(Box::new(component_metric.clone())).map_err(metrics_err)?;
        registry.register(Box::new(checks_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(alerts_total.clone())).map_err(metrics_err)?;

        Ok(Self {
            registry,
            health_score,
            memory_utilization,
            component_up,
            component_response_ms,
            component_metric,
            checks_total,
            alerts_total,
        })
    }

    pub fn observe(&self, check: &HealthCheck) {
        self.checks_total.inc();
        self.health_score.set(check.overall_score);
        if let Some(memory) = check.memory_utilization {
            self.memory_utilization.set(memory);
        }
        for component in &check.components {
            let name = component.component.as_str();
            self.component_up.with_label_values(&[name]).set(component.score);
            self.component_response_ms
                .with_label_values(&[name])
                .set(component.response_time_ms as f64);
            for (metric, value) in &component.metrics {
                self.component_metric.with_label_values(&[name, metric.as_str()]).set(*value);
            }
        }
        for alert in &check.alerts {
            let severity = match alert.severity {
                AlertSeverity::Info => "info",
                AlertSeverity::Warning => "warning",
                AlertSeverity::Critical => "critical",
            };
            self.alerts_total.with_label_values(&[severity]).inc();
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer).map_err(metrics_err)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

impl std::fmt::Debug for MonitorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorMetrics").finish_non_exhaustive()
    }
}
