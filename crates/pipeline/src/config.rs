use serde::{Deserialize, Serialize};

/// What the decode driver does when an engine call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log, discard the session, create a fresh one and keep going.
    /// Availability over exactness.
    Recover,
    /// Stop the pipeline on the first failure.
    Abort,
}

/// Tuning for segmentation and decode pacing.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lead-in audio retained before a detected utterance start (ms).
    /// Sizes the segmenter's ring window.
    pub padding_ms: u64,
    /// Fraction of the window that must be voiced (unvoiced) to enter
    /// (leave) the triggered state. Comparisons are strict, so a count
    /// exactly at the threshold does not flip the state.
    pub trigger_ratio: f32,
    /// VAD aggressiveness 0-3, passed through to the detector.
    pub vad_aggressiveness: u8,
    /// Minimum interval between partial decode requests (ms). A rate
    /// limiter, not a deadline.
    pub partial_interval_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Consecutive failures tolerated before the driver gives up even
    /// under [`FailurePolicy::Recover`].
    pub max_consecutive_failures: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            padding_ms: 300,
            trigger_ratio: 0.75,
            vad_aggressiveness: 3,
            partial_interval_ms: 500,
            failure_policy: FailurePolicy::Recover,
            max_consecutive_failures: 5,
        }
    }
}
