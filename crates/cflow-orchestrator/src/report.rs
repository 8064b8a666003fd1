//! Run and batch reports
use cflow_core::{GeneratedContent, PipelinePerformance, RunStage};
use cflow_generation::GatheredData;
use cflow_validator::{FixKind, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::insights::ContentInsights;
use crate::selection::CandidateScore;

/// What the single enhancement pass did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementReport {
    pub fixes_applied: Vec<FixKind>,
    pub ai_revised: bool,
    pub score_before: f64,
    pub score_after: f64,
    pub passed: bool,
}

/// Outcome of one pipeline run. Failed runs keep whatever was produced
/// before the failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub pipeline_id: String,
    pub success: bool,
    /// Final stage: `done` or `failed`
    pub stage: RunStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<RunStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub template_id: Option<String>,
    pub content: Option<GeneratedContent>,
    pub validation: Option<ValidationResult>,
    pub insights: Option<ContentInsights>,
    pub candidates: Vec<CandidateScore>,
    pub data_quality_score: f64,
    pub source_errors: Vec<String>,
    pub enhancement: Option<EnhancementReport>,
    pub persisted_id: Option<String>,
    pub workflow_id: Option<String>,
    pub performance: PipelinePerformance,
}

impl PipelineRun {
    pub(crate) fn started(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            success: false,
            stage: RunStage::ValidatingRequest,
            failed_at: None,
            error: None,
            error_kind: None,
            template_id: None,
            content: None,
            validation: None,
            insights: None,
            candidates: Vec::new(),
            data_quality_score: 0.0,
            source_errors: Vec::new(),
            enhancement: None,
            persisted_id: None,
            workflow_id: None,
            performance: PipelinePerformance::default(),
        }
    }

    /// Stand-in for a batch item whose task died before reporting
    pub(crate) fn aborted(reason: impl Into<String>) -> Self {
        let mut run = Self::started(uuid::Uuid::new_v4().to_string());
        run.stage = RunStage::Failed;
        run.error = Some(reason.into());
        run.error_kind = Some("aborted".to_string());
        run
    }

    pub fn quality_score(&self) -> Option<f64> {
        self.validation.as_ref().map(|v| v.overall_score)
    }

    pub fn enhancement_attempted(&self) -> bool {
        self.enhancement.is_some()
    }
}

/// How much usable context the gathering stage produced.
///
/// Without data sources the run relies on custom variables alone: 1.0 when
/// there are some, 0.0 otherwise. With sources, successful fetches weigh 0.6
/// and fetches that returned records weigh 0.4.
pub fn data_quality_score(gathered: &GatheredData, has_custom_variables: bool) -> f64 {
    if gathered.sources_requested == 0 {
        return if has_custom_variables { 1.0 } else { 0.0 };
    }
    let requested = gathered.sources_requested as f64;
    let score = 0.6 * (gathered.sources_succeeded as f64 / requested) + 0.4 * (gathered.sources_nonempty as f64 / requested);
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub runs: Vec<PipelineRun>,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub average_time_per_request_ms: f64,
    pub total_time_ms: u64,
}

impl BatchReport {
    pub fn from_runs(batch_id: impl Into<String>, runs: Vec<PipelineRun>, elapsed: Duration) -> Self {
        let successful_requests = runs.iter().filter(|r| r.success).count();
        let average_time_per_request_ms = if runs.is_empty() {
            0.0
        } else {
            runs.iter().map(|r| r.performance.total_ms as f64).sum::<f64>() / runs.len() as f64
        };
        Self {
            batch_id: batch_id.into(),
            total_requests: runs.len(),
            failed_requests: runs.len() - successful_requests,
            successful_requests,
            average_time_per_request_ms,
            total_time_ms: elapsed.as_millis() as u64,
            runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gathered(requested: usize, succeeded: usize, nonempty: usize) -> GatheredData {
        GatheredData {
            sources_requested: requested,
            sources_succeeded: succeeded,
            sources_nonempty: nonempty,
            ..Default::default()
        }
    }

    #[test]
    fn test_data_quality_without_sources() {
        assert_eq!(data_quality_score(&gathered(0, 0, 0), true), 1.0);
        assert_eq!(data_quality_score(&gathered(0, 0, 0), false), 0.0);
    }

    #[test]
    fn test_partial_context() {
        // two sources, one failed, the other returned records
        assert!((data_quality_score(&gathered(2, 1, 1), false) - 0.5).abs() < 1e-9);
        // both fetched, one came back empty
        assert!((data_quality_score(&gathered(2, 2, 1), false) - 0.8).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_data_quality_in_range(requested in 1usize..20, succeeded in 0usize..20, nonempty in 0usize..20) {
            let succeeded = succeeded.min(requested);
            let nonempty = nonempty.min(succeeded);
            let score = data_quality_score(&gathered(requested, succeeded, nonempty), false);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_batch_counts() {
        let mut ok = PipelineRun::started("a");
        ok.success = true;
        ok.performance.total_ms = 30;
        let mut failed = PipelineRun::started("b");
        failed.performance.total_ms = 10;
        let report = BatchReport::from_runs("batch", vec![ok, failed], Duration::from_millis(35));
        assert_eq!(report.total_requests, 2);
        assert_eq!(report.successful_requests, 1);
        assert_eq!(report.failed_requests, 1);
        assert_eq!(report.average_time_per_request_ms, 20.0);
        assert_eq!(report.total_time_ms, 35);
    }
}
