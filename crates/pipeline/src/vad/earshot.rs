use earshot::{VoiceActivityDetector, VoiceActivityProfile};

use super::{SpeechDetector, VadError};
use crate::PROCESS_RATE;

/// WebRTC-style voice activity detector backed by `earshot`.
pub struct EarshotDetector {
    detector: VoiceActivityDetector,
}

impl EarshotDetector {
    /// Maps aggressiveness 0-3 onto earshot's profiles; out-of-range
    /// values clamp to the strictest profile.
    pub fn new(aggressiveness: u8) -> Self {
        let profile = match aggressiveness {
            0 => VoiceActivityProfile::QUALITY,
            1 => VoiceActivityProfile::LBR,
            2 => VoiceActivityProfile::AGGRESSIVE,
            _ => VoiceActivityProfile::VERY_AGGRESSIVE,
        };
        Self {
            detector: VoiceActivityDetector::new(profile),
        }
    }
}

impl SpeechDetector for EarshotDetector {
    fn is_speech(&mut self, frame: &[i16]) -> Result<bool, VadError> {
        self.detector
            .predict_16khz(frame)
            .map_err(|_| VadError::UnsupportedFrame(frame.len()))
    }

    fn min_frame_samples(&self) -> usize {
        // 10 ms, the shortest frame the detector supports.
        (PROCESS_RATE / 100) as usize
    }
}
