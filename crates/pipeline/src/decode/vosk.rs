use std::path::Path;

use tracing::{info, warn};
use vosk::{Model, Recognizer};

use super::{DecodeEngine, DecodeError, DecodeSession};
use crate::PROCESS_RATE;

/// Kaldi-based streaming decoder.
pub struct VoskEngine {
    model: Model,
}

impl VoskEngine {
    /// Loads the model from `model_path` (a vosk model directory).
    ///
    /// `scorer_path` is accepted for interface compatibility with
    /// engines that take an external language-model scorer; vosk has
    /// no such concept, so it is ignored with a warning.
    pub fn load(model_path: &Path, scorer_path: Option<&Path>) -> Result<Self, DecodeError> {
        if let Some(scorer) = scorer_path {
            warn!(
                scorer = %scorer.display(),
                "vosk backend has no external scorer support; ignoring"
            );
        }
        info!(model = %model_path.display(), "loading decode model");
        let model = Model::new(model_path.to_string_lossy())
            .ok_or_else(|| DecodeError::ModelLoad(model_path.display().to_string()))?;
        Ok(Self { model })
    }
}

impl DecodeEngine for VoskEngine {
    fn create_session(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        let recognizer = Recognizer::new(&self.model, PROCESS_RATE as f32)
            .ok_or(DecodeError::SessionCreate)?;
        Ok(Box::new(VoskSession { recognizer }))
    }
}

struct VoskSession {
    recognizer: Recognizer,
}

impl DecodeSession for VoskSession {
    fn feed(&mut self, samples: &[i16]) -> Result<(), DecodeError> {
        self.recognizer
            .accept_waveform(samples)
            .map_err(|e| DecodeError::Feed(e.to_string()))?;
        Ok(())
    }

    fn partial(&mut self) -> Result<String, DecodeError> {
        Ok(self.recognizer.partial_result().partial.to_string())
    }

    fn finalize(mut self: Box<Self>) -> Result<String, DecodeError> {
        let text = self
            .recognizer
            .final_result()
            .single()
            .map(|result| result.text.to_string())
            .unwrap_or_default();
        Ok(text)
    }
}
