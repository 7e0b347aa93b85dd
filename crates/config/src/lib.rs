//! Startup configuration for the uttercast service.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest usable lead-in padding: one frame at the pipeline's 50
/// frames-per-second cadence.
pub const MIN_PADDING_MS: u64 = 20;

/// Runtime options for the whole service.
///
/// Built once at startup from defaults, an optional TOML file,
/// `UTTERCAST_*` environment variables and CLI flags, then validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// host:port the WebSocket push service listens on.
    pub listen_addr: String,
    /// Path to the decoding model (file or model directory).
    pub model_path: String,
    /// Optional external scorer attached at model-load time.
    pub scorer_path: Option<String>,
    /// VAD aggressiveness: 0 (least aggressive about filtering
    /// non-speech) to 3 (most aggressive).
    pub vad_aggressiveness: u8,
    /// Capture device name. None selects the default input device.
    pub input_device: Option<String>,
    /// Capture sample rate override in Hz. None uses the device rate.
    pub input_rate: Option<u32>,
    /// Read frames from a WAV file instead of the microphone.
    pub wav_path: Option<String>,
    /// Lead-in audio retained before a detected utterance start (ms).
    pub padding_ms: u64,
    /// Voiced/unvoiced window ratio that flips the segmenter state.
    pub trigger_ratio: f32,
    /// Minimum interval between partial decode requests (ms).
    pub partial_interval_ms: u64,
    /// Recreate the decode session on failure instead of stopping.
    pub recover_on_decode_failure: bool,
    /// Consecutive decode failures tolerated before the pipeline stops.
    pub max_decode_failures: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8765".to_string(),
            model_path: String::new(),
            scorer_path: None,
            vad_aggressiveness: 3,
            input_device: None,
            input_rate: None,
            wav_path: None,
            padding_ms: 300,
            trigger_ratio: 0.75,
            partial_interval_ms: 500,
            recover_on_decode_failure: true,
            max_decode_failures: 5,
        }
    }
}

/// Fatal configuration problems. Any of these prevents startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("model path '{0}' does not exist")]
    ModelNotFound(String),
    #[error("scorer path '{0}' does not exist")]
    ScorerNotFound(String),
    #[error("wav path '{0}' does not exist")]
    WavNotFound(String),
    #[error("vad aggressiveness must be 0..=3, got {0}")]
    AggressivenessOutOfRange(u8),
    #[error("trigger ratio must be within (0, 1], got {0}")]
    RatioOutOfRange(f32),
    #[error("padding_ms must be at least {MIN_PADDING_MS}, got {0}")]
    PaddingTooShort(u64),
    #[error("invalid listen address '{addr}': {reason}")]
    InvalidListenAddr { addr: String, reason: String },
    #[error("config source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl Settings {
    /// Layers defaults, an optional TOML file and `UTTERCAST_*`
    /// environment variables (e.g. `UTTERCAST_LISTEN_ADDR`).
    pub fn load(file: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("UTTERCAST"))
            .build()?;
        // Keys absent from every source fall back to Default.
        Ok(cfg.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !Path::new(&self.model_path).exists() {
            return Err(SettingsError::ModelNotFound(self.model_path.clone()));
        }
        if let Some(scorer) = &self.scorer_path
            && !Path::new(scorer).exists()
        {
            return Err(SettingsError::ScorerNotFound(scorer.clone()));
        }
        if let Some(wav) = &self.wav_path
            && !Path::new(wav).exists()
        {
            return Err(SettingsError::WavNotFound(wav.clone()));
        }
        if self.vad_aggressiveness > 3 {
            return Err(SettingsError::AggressivenessOutOfRange(
                self.vad_aggressiveness,
            ));
        }
        if !(self.trigger_ratio > 0.0 && self.trigger_ratio <= 1.0) {
            return Err(SettingsError::RatioOutOfRange(self.trigger_ratio));
        }
        if self.padding_ms < MIN_PADDING_MS {
            return Err(SettingsError::PaddingTooShort(self.padding_ms));
        }
        if let Err(e) = self.listen_addr.parse::<SocketAddr>() {
            return Err(SettingsError::InvalidListenAddr {
                addr: self.listen_addr.clone(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}
