use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{info, warn};

use super::resample::BlockResampler;
use super::{AudioFrame, FrameSource, SourceError, input_block_size, to_i16};

/// Device blocks buffered between the capture callback and `read`.
const CHANNEL_CAPACITY: usize = 64;

/// Microphone frame source.
///
/// cpal delivers samples on its own callback thread; the callback
/// downmixes to mono, slices the stream into fixed device-rate blocks
/// and queues them. `read` blocks on the queue and resamples each
/// block to the canonical rate.
///
/// Holds the live cpal stream, so a `MicSource` must stay on the
/// thread that opened it.
pub struct MicSource {
    receiver: Receiver<Vec<f32>>,
    resampler: BlockResampler,
    _stream: cpal::Stream,
}

impl MicSource {
    /// Capture device names, for the CLI selector.
    pub fn list_devices() -> anyhow::Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Opens a capture stream on the default or named device. The
    /// stream runs until the source is dropped.
    pub fn open(preferred_device: Option<&str>, input_rate: Option<u32>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => host
                .input_devices()
                .context("no input devices available")?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device '{name}' not found"))?,
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };

        let default_config = device.default_input_config()?;
        let format = default_config.sample_format();
        let mut stream_config: StreamConfig = default_config.into();
        if let Some(rate) = input_rate {
            stream_config.sample_rate = cpal::SampleRate(rate);
        }
        let device_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));
        let block_samples = input_block_size(device_rate);

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            rate = device_rate,
            channels,
            "opening capture stream"
        );

        let (sender, receiver) = bounded::<Vec<f32>>(CHANNEL_CAPACITY);
        let chunker = Arc::new(Mutex::new(BlockChunker::new(block_samples, sender)));

        let err_fn = |err| warn!(%err, "capture stream error");
        let stream = match format {
            SampleFormat::F32 => {
                let chunker = chunker.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if let Ok(mut chunker) = chunker.lock() {
                            chunker.push(data, channels, |sample| sample);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let chunker = chunker.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Ok(mut chunker) = chunker.lock() {
                            chunker.push(data, channels, |sample| {
                                f32::from(sample) / 32_768.0
                            });
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let chunker = chunker.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if let Ok(mut chunker) = chunker.lock() {
                            chunker.push(data, channels, |sample| {
                                (f32::from(sample) - 32_768.0) / 32_768.0
                            });
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };
        stream.play()?;

        Ok(Self {
            receiver,
            resampler: BlockResampler::new(device_rate, block_samples)?,
            _stream: stream,
        })
    }
}

impl FrameSource for MicSource {
    fn read(&mut self) -> Result<AudioFrame, SourceError> {
        let block = self
            .receiver
            .recv()
            .map_err(|_| SourceError::Exhausted)?;
        let resampled = self
            .resampler
            .process(&block)
            .map_err(|e| SourceError::Stream(e.to_string()))?;
        Ok(AudioFrame {
            samples: to_i16(&resampled),
        })
    }
}

/// Slices the capture callback's variable-size buffers into fixed
/// device-rate blocks and queues them for the blocking reader.
struct BlockChunker {
    block_samples: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    sender: Sender<Vec<f32>>,
}

impl BlockChunker {
    fn new(block_samples: usize, sender: Sender<Vec<f32>>) -> Self {
        Self {
            block_samples: block_samples.max(1),
            pending: Vec::with_capacity(block_samples),
            scratch: Vec::new(),
            sender,
        }
    }

    fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        downmix(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.block_samples {
            let block: Vec<f32> = self.pending.drain(..self.block_samples).collect();
            match self.sender.try_send(block) {
                Ok(()) => {}
                // Reader fell behind; dropping beats stalling the callback.
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
    }
}

/// Averages interleaved channels into mono while converting to f32.
fn downmix<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_interleaved_channels() {
        let mut buf = Vec::new();
        downmix(&mut buf, &[1.0f32, -1.0, 0.5, 0.5], 2, |s| s);
        assert_eq!(buf, vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let mut buf = Vec::new();
        downmix(&mut buf, &[0.1f32, 0.2, 0.3], 1, |s| s);
        assert_eq!(buf, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn chunker_emits_fixed_blocks() {
        let (sender, receiver) = bounded(8);
        let mut chunker = BlockChunker::new(4, sender);
        chunker.push(&[0.0f32; 6], 1, |s| s);
        assert_eq!(receiver.try_recv().unwrap().len(), 4);
        assert!(receiver.try_recv().is_err());
        chunker.push(&[0.0f32; 2], 1, |s| s);
        assert_eq!(receiver.try_recv().unwrap().len(), 4);
    }
}
