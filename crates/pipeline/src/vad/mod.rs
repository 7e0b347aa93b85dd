//! Boolean voice/non-voice classification over fixed-duration frames.

mod earshot;

pub use earshot::EarshotDetector;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VadError {
    /// The detector cannot classify frames of this length.
    #[error("unsupported frame length: {0} samples")]
    UnsupportedFrame(usize),
}

/// Voice-activity oracle consulted once per frame.
///
/// Detectors accept only the frame durations they support (commonly
/// 10/20/30 ms at 16 kHz). An unsupported frame is an error, which the
/// segmenter treats as end of stream.
pub trait SpeechDetector {
    fn is_speech(&mut self, frame: &[i16]) -> Result<bool, VadError>;

    /// Shortest frame the detector accepts, in samples.
    fn min_frame_samples(&self) -> usize;
}
