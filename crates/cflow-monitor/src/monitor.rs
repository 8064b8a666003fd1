//! Pipeline monitor: periodic health checks, threshold alerts and throttling
//!
//! The monitor is `stopped` until [`PipelineMonitor::start`] spawns the
//! interval loop, and `stopped` again once [`PipelineMonitor::stop`] has
//! awaited that loop. Both calls are idempotent.

use cflow_core::{
    Alert, AlertSeverity, ComponentStatus, EventBus, HealthProbe, PipelineEvent, ThrottleHandle, ThrottleState,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::alerts::{evaluate_thresholds, AlertLog};
use crate::config::MonitorConfig;
use crate::registry::MonitorMetrics;

/// Score at or above which the pipeline counts as healthy
pub const HEALTHY_SCORE: f64 = 0.9;
/// Score at or above which the pipeline counts as warning
pub const WARNING_SCORE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Stopped,
    Monitoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: ComponentStatus,
    /// 1 healthy, 0.5 warning, 0 unhealthy
    pub score: f64,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Result of one monitor cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub checked_at: DateTime<Utc>,
    pub overall_score: f64,
    pub status: ComponentStatus,
    pub components: Vec<ComponentHealth>,
    /// Flattened `component.metric` values plus `health_score` and
    /// `memory_utilization`
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_utilization: Option<f64>,
    pub alerts: Vec<Alert>,
}

impl HealthCheck {
    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.component == name)
    }
}

/// Fraction of healthy components; an empty set counts as healthy
pub fn overall_score(components: &[ComponentHealth]) -> f64 {
    if components.is_empty() {
        return 1.0;
    }
    let healthy = components
        .iter()
        .filter(|c| c.status == ComponentStatus::Healthy)
        .count();
    healthy as f64 / components.len() as f64
}

pub fn status_for_score(score: f64) -> ComponentStatus {
    if score >= HEALTHY_SCORE {
        ComponentStatus::Healthy
    } else if score >= WARNING_SCORE {
        ComponentStatus::Warning
    } else {
        ComponentStatus::Unhealthy
    }
}

fn status_score(status: ComponentStatus) -> f64 {
    match status {
        ComponentStatus::Healthy => 1.0,
        ComponentStatus::Warning => 0.5,
        ComponentStatus::Unhealthy => 0.0,
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct PipelineMonitor {
    config: MonitorConfig,
    bus: EventBus,
    throttle: ThrottleHandle,
    probes: RwLock<Vec<Arc<dyn HealthProbe>>>,
    alerts: AlertLog,
    metrics: MonitorMetrics,
    last_check: RwLock<Option<HealthCheck>>,
    system: Mutex<System>,
    cycles: AtomicU64,
    running: Mutex<Option<Running>>,
}

impl PipelineMonitor {
    pub fn new(config: MonitorConfig, bus: EventBus, throttle: ThrottleHandle) -> cflow_core::Result<Self> {
        Ok(Self {
            alerts: AlertLog::new(config.alert_history),
            metrics: MonitorMetrics::new()?,
            config,
            bus,
            throttle,
            probes: RwLock::new(Vec::new()),
            last_check: RwLock::new(None),
            system: Mutex::new(System::new()),
            cycles: AtomicU64::new(0),
            running: Mutex::new(None),
        })
    }

    pub fn register(&self, probe: Arc<dyn HealthProbe>) {
        debug!(component = probe.component(), "health probe registered");
        self.probes.write().unwrap_or_else(|e| e.into_inner()).push(probe);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn throttle(&self) -> &ThrottleHandle {
        &self.throttle
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    pub fn last_check(&self) -> Option<HealthCheck> {
        self.last_check.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Completed cycles since creation
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> MonitorState {
        if self.running.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
            MonitorState::Monitoring
        } else {
            MonitorState::Stopped
        }
    }

    /// Spawn the interval loop. The first cycle runs immediately.
    /// Calling `start` on a running monitor does nothing. The loop only
    /// holds a weak reference and exits once the last handle is dropped.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            debug!("monitor already running");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let weak = Arc::downgrade(self);
        let period = self.config.interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        // the loop never keeps a dropped monitor alive
                        let Some(monitor) = weak.upgrade() else { break };
                        monitor.run_cycle().await;
                    }
                }
            }
            debug!("monitor loop exited");
        });

        info!(interval_ms = period.as_millis() as u64, "pipeline monitor started");
        *running = Some(Running { shutdown, handle });
    }

    /// Stop the loop and wait for it to exit. No cycle runs after this
    /// returns. Stopping a stopped monitor does nothing.
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(Running { shutdown, handle }) = running else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(join_err) = handle.await {
            warn!(error = %join_err, "monitor loop ended abnormally");
        }
        info!(cycles = self.cycles(), "pipeline monitor stopped");
    }

    /// Run one full cycle: probe, collect, evaluate, alert, throttle.
    #[instrument(skip_all, fields(probes = self.probe_count()))]
    pub async fn run_cycle(&self) -> HealthCheck {
        let probes: Vec<Arc<dyn HealthProbe>> = self.probes.read().unwrap_or_else(|e| e.into_inner()).clone();
        let timeout = self.config.probe_timeout();
        let components = join_all(probes.into_iter().map(|probe| check_probe(probe, timeout))).await;

        let overall = overall_score(&components);
        let status = status_for_score(overall);
        let memory = if self.config.system_metrics {
            self.memory_utilization()
        } else {
            None
        };

        let mut metrics = BTreeMap::new();
        for component in &components {
            for (name, value) in &component.metrics {
                metrics.insert(format!("{}.{}", component.component, name), *value);
            }
            metrics.insert(
                format!("{}.response_time_ms", component.component),
                component.response_time_ms as f64,
            );
        }
        metrics.insert("health_score".to_string(), overall);
        if let Some(memory) = memory {
            metrics.insert("memory_utilization".to_string(), memory);
        }

        let alerts = evaluate_thresholds(&self.config.thresholds, &metrics);
        for alert in &alerts {
            warn!(
                metric = %alert.metric,
                observed = alert.observed,
                threshold = alert.threshold,
                severity = ?alert.severity,
                "threshold breached"
            );
            self.alerts.record(alert.clone());
            self.bus.publish(PipelineEvent::Alert(alert.clone()));
        }

        let check = HealthCheck {
            checked_at: Utc::now(),
            overall_score: overall,
            status,
            components,
            metrics,
            memory_utilization: memory,
            alerts,
        };

        self.apply_throttle(&check);
        self.metrics.observe(&check);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        debug!(score = overall, status = %status, alerts = check.alerts.len(), "health check complete");

        *self.last_check.write().unwrap_or_else(|e| e.into_inner()) = Some(check.clone());
        check
    }

    fn apply_throttle(&self, check: &HealthCheck) {
        let critical = check.alerts.iter().any(|a| a.severity == AlertSeverity::Critical);
        let next = if self.config.halt_on_critical && critical {
            ThrottleState::Halted
        } else if self.config.throttle_on_unhealthy && check.status == ComponentStatus::Unhealthy {
            ThrottleState::Throttled
        } else {
            ThrottleState::Open
        };
        self.throttle.set(next);
    }

    fn memory_utilization(&self) -> Option<f64> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        let total = system.total_memory();
        (total > 0).then(|| system.used_memory() as f64 / total as f64)
    }
}

impl std::fmt::Debug for PipelineMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMonitor")
            .field("state", &self.state())
            .field("probes", &self.probe_count())
            .field("cycles", &self.cycles())
            .finish()
    }
}

/// Probe one component in its own task so a panicking probe is contained
async fn check_probe(probe: Arc<dyn HealthProbe>, timeout: Duration) -> ComponentHealth {
    let component = probe.component().to_string();
    let started = Instant::now();

    let task_probe = Arc::clone(&probe);
    let handle = tokio::spawn(async move { tokio::time::timeout(timeout, task_probe.probe()).await });

    let (status, detail) = match handle.await {
        Ok(Ok(Ok(report))) => (report.status, report.detail),
        Ok(Ok(Err(e))) => (ComponentStatus::Unhealthy, Some(e.to_string())),
        Ok(Err(_elapsed)) => (
            ComponentStatus::Unhealthy,
            Some(format!("probe timed out after {}ms", timeout.as_millis())),
        ),
        Err(join_err) => (ComponentStatus::Unhealthy, Some(format!("probe task failed: {}", join_err))),
    };
    let response_time_ms = started.elapsed().as_millis() as u64;

    if status != ComponentStatus::Healthy {
        debug!(component = %component, status = %status, detail = ?detail, "component not healthy");
    }

    ComponentHealth {
        score: status_score(status),
        metrics: probe.metrics(),
        component,
        status,
        response_time_ms,
        detail,
    }
}
