//! Turns a continuous audio stream into segmented utterances and
//! incremental transcription results.
//!
//! Flow: [`FrameSource`] → [`UtteranceSegmenter`] → [`DecodeDriver`].
//! The driver publishes [`ResultEvent`]s into a channel owned by the
//! caller; everything here runs on one sequential producer thread and
//! never blocks on the consumers.

pub mod config;
pub mod decode;
pub mod driver;
pub mod event;
pub mod segmenter;
pub mod source;
pub mod vad;
pub mod worker;

pub use config::{FailurePolicy, PipelineConfig};
pub use driver::DecodeDriver;
pub use event::{ResultEvent, ResultItem, ResultPayload};
pub use segmenter::{UtteranceEvent, UtteranceSegmenter};
pub use source::{AudioFrame, FrameSource, SourceError};
pub use vad::{EarshotDetector, SpeechDetector, VadError};
pub use worker::PipelineWorker;

/// Canonical processing sample rate in Hz. Capture at any other rate
/// is resampled to this before classification and decoding.
pub const PROCESS_RATE: u32 = 16_000;

/// Fixed frame cadence of the pipeline.
pub const FRAMES_PER_SECOND: u32 = 50;

/// Samples per frame at the canonical rate.
pub const FRAME_SAMPLES: usize = (PROCESS_RATE / FRAMES_PER_SECOND) as usize;

/// Duration of one frame in milliseconds.
pub const FRAME_DURATION_MS: u64 = (1000 / FRAMES_PER_SECOND) as u64;
