use async_trait::async_trait;
use cflow_core::{
    AlertSeverity, CflowError, ComponentStatus, EventBus, HealthProbe, PipelineEvent, ProbeReport, ThrottleHandle,
    ThrottleState,
};
use cflow_monitor::{MonitorConfig, MonitorState, PipelineMonitor};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

enum Behavior {
    Report(ComponentStatus),
    Fail,
    Hang,
    Panic,
}

struct TestProbe {
    name: String,
    behavior: Behavior,
    metrics: BTreeMap<String, f64>,
}

impl TestProbe {
    fn new(name: impl Into<String>, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behavior,
            metrics: BTreeMap::new(),
        })
    }

    fn with_metrics(name: &str, metrics: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behavior: Behavior::Report(ComponentStatus::Healthy),
            metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }
}

#[async_trait]
impl HealthProbe for TestProbe {
    fn component(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> cflow_core::Result<ProbeReport> {
        match &self.behavior {
            Behavior::Report(ComponentStatus::Healthy) => Ok(ProbeReport::healthy()),
            Behavior::Report(ComponentStatus::Warning) => Ok(ProbeReport::warning("slow")),
            Behavior::Report(ComponentStatus::Unhealthy) => Ok(ProbeReport::unhealthy("down")),
            Behavior::Fail => Err(CflowError::Store("connection refused".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProbeReport::healthy())
            }
            Behavior::Panic => panic!("probe exploded"),
        }
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics.clone()
    }
}

fn config() -> MonitorConfig {
    MonitorConfig {
        interval_ms: 10,
        probe_timeout_ms: 50,
        system_metrics: false,
        ..MonitorConfig::default()
    }
}

fn monitor_with(config: MonitorConfig, healthy: usize, unhealthy: usize) -> (Arc<PipelineMonitor>, EventBus) {
    let bus = EventBus::default();
    let monitor = Arc::new(PipelineMonitor::new(config, bus.clone(), ThrottleHandle::new()).unwrap());
    for i in 0..healthy {
        monitor.register(TestProbe::new(format!("ok-{}", i), Behavior::Report(ComponentStatus::Healthy)));
    }
    for i in 0..unhealthy {
        monitor.register(TestProbe::new(format!("down-{}", i), Behavior::Report(ComponentStatus::Unhealthy)));
    }
    (monitor, bus)
}

#[tokio::test]
async fn test_low_health_score_raises_alert() {
    let (monitor, bus) = monitor_with(config(), 3, 7);
    let mut events = bus.subscribe();

    let check = monitor.run_cycle().await;
    assert!((check.overall_score - 0.3).abs() < 1e-9);
    assert_eq!(check.status, ComponentStatus::Unhealthy);

    let alert = check.alerts.iter().find(|a| a.metric == "health_score").unwrap();
    assert_eq!(alert.threshold, 0.6);
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(monitor.alerts().for_metric("health_score").len(), 1);

    match events.recv().await.unwrap() {
        PipelineEvent::Alert(published) => assert_eq!(published.metric, "health_score"),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(monitor.throttle().state(), ThrottleState::Throttled);
}

#[tokio::test]
async fn test_high_health_score_stays_quiet() {
    let (monitor, _bus) = monitor_with(config(), 19, 1);
    let check = monitor.run_cycle().await;
    assert!((check.overall_score - 0.95).abs() < 1e-9);
    assert_eq!(check.status, ComponentStatus::Healthy);
    assert!(check.alerts.iter().all(|a| a.metric != "health_score"));
    assert!(monitor.alerts().for_metric("health_score").is_empty());
    assert_eq!(monitor.throttle().state(), ThrottleState::Open);
}

#[tokio::test]
async fn test_failing_probes_are_unhealthy_not_fatal() {
    let (monitor, _bus) = monitor_with(config(), 1, 0);
    monitor.register(TestProbe::new("erroring", Behavior::Fail));
    monitor.register(TestProbe::new("hanging", Behavior::Hang));
    monitor.register(TestProbe::new("panicking", Behavior::Panic));

    let check = monitor.run_cycle().await;
    assert_eq!(check.components.len(), 4);
    for name in ["erroring", "hanging", "panicking"] {
        let component = check.component(name).unwrap();
        assert_eq!(component.status, ComponentStatus::Unhealthy, "{}", name);
        assert_eq!(component.score, 0.0);
        assert!(component.detail.is_some());
    }
    assert!(check.component("hanging").unwrap().detail.as_deref().unwrap().contains("timed out"));
    assert!((check.overall_score - 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_component_metrics_checked_against_rules() {
    let (monitor, _bus) = monitor_with(config(), 0, 0);
    monitor.register(TestProbe::with_metrics(
        "content_pipeline",
        &[("error_rate", 0.4), ("average_quality", 0.55), ("runs_total", 12.0)],
    ));

    let check = monitor.run_cycle().await;
    assert_eq!(check.metrics["content_pipeline.runs_total"], 12.0);
    let mut metrics: Vec<&str> = check.alerts.iter().map(|a| a.metric.as_str()).collect();
    metrics.sort();
    assert_eq!(metrics, vec!["content_pipeline.average_quality", "content_pipeline.error_rate"]);
    assert!(check
        .alerts
        .iter()
        .all(|a| a.component.as_deref() == Some("content_pipeline")));
}

#[tokio::test]
async fn test_critical_alert_halts_when_configured() {
    let config = MonitorConfig {
        halt_on_critical: true,
        ..config()
    };
    let (monitor, _bus) = monitor_with(config, 1, 4);
    monitor.run_cycle().await;
    assert!(monitor.throttle().is_halted());
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let (monitor, _bus) = monitor_with(config(), 2, 0);
    assert_eq!(monitor.state(), MonitorState::Stopped);

    monitor.start();
    monitor.start();
    assert_eq!(monitor.state(), MonitorState::Monitoring);

    tokio::time::sleep(Duration::from_millis(60)).await;
    monitor.stop().await;
    assert_eq!(monitor.state(), MonitorState::Stopped);

    let cycles = monitor.cycles();
    assert!(cycles >= 1);
    assert!(monitor.last_check().is_some());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(monitor.cycles(), cycles);

    // stopping twice is harmless
    monitor.stop().await;
}

#[tokio::test]
async fn test_dropping_running_monitor_ends_loop() {
    let (monitor, _bus) = monitor_with(config(), 0, 0);
    let tracked = TestProbe::new("tracked", Behavior::Report(ComponentStatus::Healthy));
    monitor.register(tracked.clone());
    monitor.start();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(monitor.cycles() >= 1);
    assert!(Arc::strong_count(&tracked) >= 2);

    // no stop(): the last handle goes away while the loop is live
    drop(monitor);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(Arc::strong_count(&tracked), 1);
}

#[tokio::test]
async fn test_prometheus_exposition() {
    let (monitor, _bus) = monitor_with(config(), 1, 1);
    monitor.run_cycle().await;
    let text = monitor.metrics().encode().unwrap();
    assert!(text.contains("cflow_health_score 0.5"));
    assert!(text.contains("cflow_component_up{component=\"down-0\"} 0"));
    assert!(text.contains("cflow_health_checks_total 1"));
    assert!(text.contains("cflow_alerts_total{severity=\"critical\"} 1"));
}
