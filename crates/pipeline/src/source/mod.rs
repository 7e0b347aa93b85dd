//! Frame acquisition: microphone capture and WAV file input behind a
//! common blocking-read contract.

mod mic;
mod resample;
mod wav;

pub use mic::MicSource;
pub use wav::WavFileSource;

use thiserror::Error;

use crate::FRAMES_PER_SECOND;

/// Fixed-duration block of 16-bit signed mono PCM at the canonical
/// processing rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Capture ended or file data ran out. Ends segmentation
    /// gracefully, never surfaced as a user-facing error.
    #[error("frame source exhausted")]
    Exhausted,
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Produces canonical-rate frames at a constant frames-per-second
/// cadence, resampling when the input rate differs.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    fn read(&mut self) -> Result<AudioFrame, SourceError>;
}

/// Device-rate samples per block for a given input rate, so every
/// source yields the same frames-per-second cadence.
pub(crate) fn input_block_size(input_rate: u32) -> usize {
    (f64::from(input_rate) / f64::from(FRAMES_PER_SECOND)).round() as usize
}

/// Converts normalized f32 samples back to the 16-bit amplitude scale.
pub(crate) fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32_768.0) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_tracks_input_rate() {
        assert_eq!(input_block_size(16_000), 320);
        assert_eq!(input_block_size(44_100), 882);
        assert_eq!(input_block_size(48_000), 960);
    }

    #[test]
    fn i16_conversion_saturates() {
        let samples = to_i16(&[0.0, 0.5, 1.0, -1.0, 2.0]);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], 16_384);
        assert_eq!(samples[2], i16::MAX);
        assert_eq!(samples[3], i16::MIN);
        assert_eq!(samples[4], i16::MAX);
    }
}
