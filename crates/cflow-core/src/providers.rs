//! Collaborator interfaces: record store, workflow store, AI completion
//!
//! The pipeline only talks to the outside world through these traits.
//! Concrete stores and model vendors live outside the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::data_model::{DataSourceFilter, SourceRecord, SourceType};
use crate::error::{ProviderError, Result};

// ============================================================================
// RECORD STORE
// ============================================================================

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch records of one type matching the filter
    async fn fetch(&self, source_type: SourceType, filter: &DataSourceFilter) -> Result<Vec<SourceRecord>>;

    /// Persist an entity and return its id
    async fn persist(&self, kind: &str, entity: Value) -> Result<String>;
}

// ============================================================================
// APPROVAL WORKFLOWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub order: u32,
    pub name: String,
    pub reviewer_role: String,
    pub sla_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub content_id: String,
    pub steps: Vec<ApprovalStep>,
    pub reviewers: Vec<String>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_workflow(&self, request: WorkflowRequest) -> Result<String>;
}

// ============================================================================
// AI COMPLETION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.7,
        }
    }
}

/// A text-completion capability
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, ProviderError>;
}

/// Either a wired-up completion provider or an explicit "none configured".
///
/// Callers match on this instead of probing for methods, so every fallback
/// path is spelled out.
#[derive(Clone, Default)]
pub enum AiProvider {
    Available(Arc<dyn CompletionProvider>),
    #[default]
    Unavailable,
}

impl AiProvider {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::Available(provider)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Available(p) => p.name(),
            Self::Unavailable => "unavailable",
        }
    }

    /// Run one completion bounded by `timeout`.
    ///
    /// `Ok("")` means the provider answered with nothing; errors mean it
    /// could not answer at all.
    pub async fn complete_with_timeout(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        timeout: Duration,
    ) -> std::result::Result<String, ProviderError> {
        match self {
            Self::Unavailable => Err(ProviderError::Unavailable),
            Self::Available(provider) => {
                match tokio::time::timeout(timeout, provider.complete(prompt, options)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                }
            }
        }
    }
}

impl std::fmt::Debug for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(p) => write!(f, "AiProvider::Available({})", p.name()),
            Self::Unavailable => write!(f, "AiProvider::Unavailable"),
        }
    }
}
