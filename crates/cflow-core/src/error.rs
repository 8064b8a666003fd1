//! Unified error model
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CflowError {
    #[error("INPUT/{0}")]
    InputValidation(String),

    #[error("TEMPLATE/not found: {0}")]
    TemplateNotFound(String),

    #[error("TEMPLATE/no viable template: {0}")]
    NoViableTemplate(String),

    #[error("PROVIDER/{0}")]
    Provider(#[from] ProviderError),

    #[error("VALIDATION/{0}")]
    ValidationFailure(String),

    #[error("HEALTH/{component}: {reason}")]
    ComponentUnhealthy { component: String, reason: String },

    #[error("STORE/{0}")]
    Store(String),

    #[error("RENDER/{0}")]
    Render(String),

    #[error("WORKFLOW/{0}")]
    Workflow(String),

    #[error("CONFIG/{0}")]
    Config(String),
}

impl CflowError {
    /// Stable short name used in run reports and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::NoViableTemplate(_) => "no_viable_template",
            Self::Provider(_) => "provider",
            Self::ValidationFailure(_) => "validation_failure",
            Self::ComponentUnhealthy { .. } => "component_unhealthy",
            Self::Store(_) => "store",
            Self::Render(_) => "render",
            Self::Workflow(_) => "workflow",
            Self::Config(_) => "config",
        }
    }
}

/// Failures of the AI completion capability.
///
/// Kept separate from an empty completion so callers can tell "the provider
/// broke" apart from "the provider had nothing to say".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable")]
    Unavailable,

    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, CflowError>;
