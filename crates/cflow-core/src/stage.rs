//! Run stages: the per-run state machine of the content pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    ValidatingRequest,
    GatheringData,
    DerivingInsights,
    SelectingTemplate,
    GeneratingContent,
    ValidatingOutput,
    EnhancingContent,
    CreatingWorkflow,
    Done,
    Failed,
}

impl RunStage {
    /// Stage ID (ex: "gathering_data")
    pub fn id(&self) -> &'static str {
        match self {
            Self::ValidatingRequest => "validating_request",
            Self::GatheringData => "gathering_data",
            Self::DerivingInsights => "deriving_insights",
            Self::SelectingTemplate => "selecting_template",
            Self::GeneratingContent => "generating_content",
            Self::ValidatingOutput => "validating_output",
            Self::EnhancingContent => "enhancing_content",
            Self::CreatingWorkflow => "creating_workflow",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Legal forward transitions. `Failed` is reachable from any
    /// non-terminal stage.
    pub fn can_transition_to(&self, next: RunStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == RunStage::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::ValidatingRequest, Self::GatheringData)
                | (Self::GatheringData, Self::DerivingInsights)
                | (Self::DerivingInsights, Self::SelectingTemplate)
                | (Self::SelectingTemplate, Self::GeneratingContent)
                | (Self::GeneratingContent, Self::ValidatingOutput)
                | (Self::ValidatingOutput, Self::EnhancingContent)
                | (Self::ValidatingOutput, Self::CreatingWorkflow)
                | (Self::EnhancingContent, Self::CreatingWorkflow)
                | (Self::CreatingWorkflow, Self::Done)
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub from: RunStage,
    pub to: RunStage,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "STAGE/TRANSITION: {} -> {} is not allowed", self.from, self.to)
    }
}

impl std::error::Error for StageError {}
