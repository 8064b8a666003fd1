//! Health probes and the throttle signal shared with the monitor
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Warning,
    Unhealthy,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// What a component says about itself when probed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            detail: None,
        }
    }

    pub fn warning(detail: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Warning,
            detail: Some(detail.into()),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            detail: Some(detail.into()),
        }
    }
}

/// Lightweight status probe every monitored component exposes.
///
/// Probes only read component state; they never touch pipeline data.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &str;

    async fn probe(&self) -> Result<ProbeReport>;

    /// Numeric counters for the monitor (throughput, averages, ...)
    fn metrics(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleState {
    Open,
    Throttled,
    Halted,
}

/// Shared switch the monitor flips and the orchestrator reads
#[derive(Debug, Clone)]
pub struct ThrottleHandle {
    state: Arc<AtomicU8>,
}

impl ThrottleHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn state(&self) -> ThrottleState {
        match self.state.load(Ordering::Acquire) {
            0 => ThrottleState::Open,
            1 => ThrottleState::Throttled,
            _ => ThrottleState::Halted,
        }
    }

    pub fn set(&self, state: ThrottleState) {
        let raw = match state {
            ThrottleState::Open => 0,
            ThrottleState::Throttled => 1,
            ThrottleState::Halted => 2,
        };
        let previous = self.state.swap(raw, Ordering::AcqRel);
        if previous != raw {
            tracing::info!(state = ?state, "pipeline throttle changed");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state() == ThrottleState::Halted
    }
}

impl Default for ThrottleHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_is_shared_between_clones() {
        let a = ThrottleHandle::new();
        let b = a.clone();
        assert_eq!(b.state(), ThrottleState::Open);

        a.set(ThrottleState::Halted);
        assert!(b.is_halted());

        b.set(ThrottleState::Throttled);
        assert_eq!(a.state(), ThrottleState::Throttled);
    }

    #[test]
    fn test_status_ordering() {
        assert!(ComponentStatus::Healthy < ComponentStatus::Warning);
        assert!(ComponentStatus::Warning < ComponentStatus::Unhealthy);
    }
}
