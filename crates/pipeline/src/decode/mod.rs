//! Streaming decode engine seam and session lifecycle.

#[cfg(feature = "vosk")]
mod vosk;

#[cfg(feature = "vosk")]
pub use vosk::VoskEngine;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to load decode model from '{0}'")]
    ModelLoad(String),
    #[error("failed to create decode session")]
    SessionCreate,
    #[error("feed failed: {0}")]
    Feed(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Factory for decode sessions. One engine is loaded at startup and
/// hands out the single live session the driver owns.
pub trait DecodeEngine: Send {
    fn create_session(&self) -> Result<Box<dyn DecodeSession>, DecodeError>;
}

/// An in-progress utterance decode.
///
/// `partial` is non-destructive and may be requested repeatedly while
/// audio keeps arriving. `finalize` consumes the session, so a
/// finalized handle can never be fed again.
pub trait DecodeSession {
    /// Appends canonical-rate PCM to the session. No synchronous
    /// result.
    fn feed(&mut self, samples: &[i16]) -> Result<(), DecodeError>;

    /// Best-effort transcript of the audio fed so far.
    fn partial(&mut self) -> Result<String, DecodeError>;

    /// Final transcript for the utterance, invalidating the session.
    fn finalize(self: Box<Self>) -> Result<String, DecodeError>;
}
