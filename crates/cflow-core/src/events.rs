//! Typed pipeline events and the broadcast bus that carries them
//!
//! Every subscriber sees events in publish order. A subscriber that falls
//! more than `capacity` events behind loses the oldest ones and is told how
//! many it missed (`RecvError::Lagged`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::data_model::TemplateType;
use crate::providers::ApprovalStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A threshold breach observed by the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub metric: String,
    pub observed: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    ApprovalRequest {
        workflow_id: String,
        content_id: String,
        content_type: TemplateType,
        content_title: String,
        steps: Vec<ApprovalStep>,
        reviewers: Vec<String>,
    },
    Alert(Alert),
    PipelineCompleted {
        pipeline_id: String,
        success: bool,
        quality_score: Option<f64>,
        duration_ms: u64,
        reason: Option<String>,
    },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApprovalRequest { .. } => "approval_request",
            Self::Alert(_) => "alert",
            Self::PipelineCompleted { .. } => "pipeline_completed",
        }
    }
}

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers. Returns how many received it;
    /// publishing with nobody listening is not an error.
    pub fn publish(&self, event: PipelineEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::trace!(event = name, receivers, "event published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
