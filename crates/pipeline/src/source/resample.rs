use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async as AsyncResampler, FixedAsync, Resampler as RubatoResampler, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::PROCESS_RATE;

/// Converts fixed-size device-rate blocks to the canonical rate using
/// sinc interpolation.
///
/// Output is trimmed or zero-padded to exactly
/// `round(len * 16000 / input_rate)` samples per block so downstream
/// frames stay fixed-size; identity when the rates already match.
pub(crate) struct BlockResampler {
    inner: Option<AsyncResampler<f32>>,
    ratio: f64,
    chunk_size: usize,
}

impl BlockResampler {
    pub(crate) fn new(input_rate: u32, chunk_size: usize) -> anyhow::Result<Self> {
        if input_rate == PROCESS_RATE {
            return Ok(Self {
                inner: None,
                ratio: 1.0,
                chunk_size,
            });
        }
        let ratio = f64::from(PROCESS_RATE) / f64::from(input_rate);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = AsyncResampler::<f32>::new_sinc(
            ratio,
            2.0,
            &params,
            chunk_size,
            1, // mono
            FixedAsync::Input,
        )
        .map_err(|e| anyhow::anyhow!("failed to create resampler: {e}"))?;

        Ok(Self {
            inner: Some(inner),
            ratio,
            chunk_size,
        })
    }

    pub(crate) fn process(&mut self, block: &[f32]) -> anyhow::Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(block.to_vec());
        };

        let expected = (block.len() as f64 * self.ratio).round() as usize;
        let input = if block.len() < self.chunk_size {
            let mut padded = block.to_vec();
            padded.resize(self.chunk_size, 0.0);
            padded
        } else {
            block.to_vec()
        };

        let frames = input.len();
        let input_adapter = InterleavedSlice::new(&input, 1, frames)
            .map_err(|e| anyhow::anyhow!("input adapter error: {e}"))?;

        let result = resampler
            .process(&input_adapter, 0, None)
            .map_err(|e| anyhow::anyhow!("resample error: {e}"))?;

        let mut output = result.take_data();
        // The sinc stage trades a little latency for quality; pin each
        // block to its exact expected length.
        if output.len() > expected {
            output.truncate(expected);
        } else {
            output.resize(expected, 0.0);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_rates_match() {
        let mut resampler = BlockResampler::new(PROCESS_RATE, 320).unwrap();
        let block = vec![0.25f32; 320];
        assert_eq!(resampler.process(&block).unwrap(), block);
    }

    #[test]
    fn downsampling_yields_exact_block_length() {
        let mut resampler = BlockResampler::new(48_000, 960).unwrap();
        let block: Vec<f32> = (0..960).map(|i| (i as f32 * 0.01).sin()).collect();
        for _ in 0..5 {
            let out = resampler.process(&block).unwrap();
            assert_eq!(out.len(), 320);
        }
    }

    #[test]
    fn short_final_block_scales_proportionally() {
        let mut resampler = BlockResampler::new(48_000, 960).unwrap();
        let out = resampler.process(&vec![0.0f32; 480]).unwrap();
        assert_eq!(out.len(), 160);
    }
}
