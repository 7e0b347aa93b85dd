use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use super::resample::BlockResampler;
use super::{AudioFrame, FrameSource, SourceError, input_block_size, to_i16};

/// Serves a WAV file as fixed-size blocks behind the same blocking
/// `read` contract as live capture.
///
/// Supports 16/24/32-bit integer and 32-bit float formats; stereo is
/// downmixed to mono.
pub struct WavFileSource {
    samples: Vec<f32>,
    cursor: usize,
    block_samples: usize,
    resampler: BlockResampler,
}

impl WavFileSource {
    /// Loads the file up front. The header's sample rate drives
    /// resampling; a configured rate that disagrees is logged and
    /// ignored.
    pub fn open(path: &Path, configured_rate: Option<u32>) -> anyhow::Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open WAV '{}'", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let sample_rate = spec.sample_rate;
        if let Some(rate) = configured_rate
            && rate != sample_rate
        {
            warn!(
                configured = rate,
                header = sample_rate,
                "configured input rate differs from WAV header; using the header"
            );
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.unwrap_or(0) as f32 / max_val)
                    .collect()
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.unwrap_or(0.0))
                .collect(),
        };

        let mono = if channels > 1 {
            samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            samples
        };

        let block_samples = input_block_size(sample_rate);
        info!(
            file = %path.display(),
            sample_rate,
            samples = mono.len(),
            "WAV source loaded"
        );
        Ok(Self {
            samples: mono,
            cursor: 0,
            block_samples,
            resampler: BlockResampler::new(sample_rate, block_samples)?,
        })
    }
}

impl FrameSource for WavFileSource {
    fn read(&mut self) -> Result<AudioFrame, SourceError> {
        if self.cursor >= self.samples.len() {
            return Err(SourceError::Exhausted);
        }
        // The final block may come up short; downstream treats a short
        // frame as end of stream, same as live capture cutting out.
        let end = (self.cursor + self.block_samples).min(self.samples.len());
        let block = &self.samples[self.cursor..end];
        self.cursor = end;
        let resampled = self
            .resampler
            .process(block)
            .map_err(|e| SourceError::Stream(e.to_string()))?;
        Ok(AudioFrame {
            samples: to_i16(&resampled),
        })
    }
}
