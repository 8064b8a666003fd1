//! Stage recorder: walks a run through its stages and collects timings
use crate::stage::{RunStage, StageError};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: RunStage,
    pub latency_ms: u64,
}

/// Per-stage timings of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelinePerformance {
    pub stages: Vec<StageTiming>,
    pub total_ms: u64,
}

impl PipelinePerformance {
    pub fn stage_ms(&self, stage: RunStage) -> Option<u64> {
        self.stages.iter().find(|t| t.stage == stage).map(|t| t.latency_ms)
    }
}

pub struct StageRecorder {
    pipeline_id: String,
    current: RunStage,
    stage_started: Instant,
    run_started: Instant,
    timings: Vec<StageTiming>,
}

impl StageRecorder {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            pipeline_id: pipeline_id.into(),
            current: RunStage::ValidatingRequest,
            stage_started: now,
            run_started: now,
            timings: Vec::new(),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn current(&self) -> RunStage {
        self.current
    }

    /// Close the current stage and enter `next`.
    pub fn advance(&mut self, next: RunStage) -> Result<(), StageError> {
        if !self.current.can_transition_to(next) {
            return Err(StageError {
                from: self.current,
                to: next,
            });
        }

        self.timings.push(StageTiming {
            stage: self.current,
            latency_ms: self.stage_started.elapsed().as_millis() as u64,
        });
        tracing::debug!(
            pipeline_id = %self.pipeline_id,
            from = %self.current,
            to = %next,
            "stage transition"
        );

        self.current = next;
        self.stage_started = Instant::now();
        Ok(())
    }

    /// Move to `Failed` from wherever the run currently is. No-op once the
    /// run is terminal.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            // Failed is reachable from every non-terminal stage
            let _ = self.advance(RunStage::Failed);
        }
    }

    pub fn finish(self) -> (RunStage, PipelinePerformance) {
        let performance = PipelinePerformance {
            stages: self.timings,
            total_ms: self.run_started.elapsed().as_millis() as u64,
        };
        (self.current, performance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_each_closed_stage() {
        let mut recorder = StageRecorder::new("run-1");
        recorder.advance(RunStage::GatheringData).unwrap();
        recorder.advance(RunStage::DerivingInsights).unwrap();
        recorder.fail();

        let (stage, perf) = recorder.finish();
        assert_eq!(stage, RunStage::Failed);
        assert_eq!(perf.stages.len(), 3);
        assert!(perf.stage_ms(RunStage::GatheringData).is_some());
    }

    #[test]
    fn test_rejects_skipping_stages() {
        let mut recorder = StageRecorder::new("run-2");
        let err = recorder.advance(RunStage::GeneratingContent).unwrap_err();
        assert_eq!(err.from, RunStage::ValidatingRequest);
        assert_eq!(recorder.current(), RunStage::ValidatingRequest);
    }
}
