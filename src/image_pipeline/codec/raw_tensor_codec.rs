use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::bayer::{BayerGeometry, SlotOffset};
use crate::image_pipeline::codec::types::{CHANNELS, CodecConfig, NormalizedTensor};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::exposure::GainRatio;
use crate::image_pipeline::raw::{BYTES_PER_SAMPLE, RawBuffer};

/// Clamps into `[0, 1]`; NaN maps to 0 so no power operation ever sees it.
#[inline(always)]
fn clamp_unit(v: f32) -> f32 {
    if v > 0.0 { v.min(1.0) } else { 0.0 }
}

#[inline(always)]
fn byte_offset(raw_width: usize, y: usize, x: usize) -> usize {
    (y * raw_width + x) * BYTES_PER_SAMPLE
}

fn check_even(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(PipelineError::InvalidDimensions(width, height));
    }
    Ok(())
}

/// Converts between the interleaved raw mosaic and the normalized 4-channel tensor.
#[derive(Debug, Clone)]
pub struct RawTensorCodec {
    config: CodecConfig,
}

impl RawTensorCodec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Packs each 2x2 tile into one tensor cell, brightened by `gain` and gamma-encoded.
    pub fn forward(
        &self,
        raw: &RawBuffer,
        geometry: &BayerGeometry,
        gain: GainRatio,
    ) -> Result<NormalizedTensor> {
        let raw_width = raw.width();
        let raw_height = raw.height();
        check_even(raw_width, raw_height)?;

        let tile_width = raw_width / 2;
        let tile_height = raw_height / 2;
        debug!(
            "Forward transform {}x{} -> {}x{}x{} ({}, gain {})",
            raw_width,
            raw_height,
            tile_height,
            tile_width,
            CHANNELS,
            geometry.pattern(),
            gain
        );

        let black = self.config.black_level as f32;
        let scale = gain.as_f32() / self.config.range();
        let inv_gamma = 1.0 / self.config.gamma;
        let offsets = geometry.channel_offsets();
        let bytes = raw.as_bytes();

        let mut tensor = NormalizedTensor::zeroed(tile_height, tile_width);
        tensor
            .as_mut_slice()
            .par_chunks_mut(tile_width * CHANNELS)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, cell) in row.chunks_exact_mut(CHANNELS).enumerate() {
                    for (value, &SlotOffset { row: dy, col: dx }) in cell.iter_mut().zip(&offsets) {
                        let at = byte_offset(raw_width, 2 * i + dy, 2 * j + dx);
                        let sample = u16::from_le_bytes([bytes[at], bytes[at + 1]]) as f32;
                        *value = clamp_unit((sample - black) * scale).powf(inv_gamma);
                    }
                }
            });

        Ok(tensor.with_gain(gain))
    }

    /// Scatters each tensor cell back into its 2x2 tile of a `out_width x out_height` buffer.
    pub fn inverse(
        &self,
        tensor: &NormalizedTensor,
        geometry: &BayerGeometry,
        out_width: usize,
        out_height: usize,
    ) -> Result<RawBuffer> {
        check_even(out_width, out_height)?;
        if tensor.width() * 2 != out_width || tensor.height() * 2 != out_height {
            return Err(PipelineError::DimensionMismatch(format!(
                "tensor {}x{} tiles cannot fill a {}x{} raw buffer",
                tensor.height(),
                tensor.width(),
                out_width,
                out_height
            )));
        }

        let divisor = if self.config.restore_exposure {
            tensor.gain().as_f32()
        } else {
            1.0
        };
        debug!(
            "Inverse transform {}x{}x{} -> {}x{} ({}, divisor {})",
            tensor.height(),
            tensor.width(),
            CHANNELS,
            out_width,
            out_height,
            geometry.pattern(),
            divisor
        );

        let black = self.config.black_level as f32;
        let scale = self.config.range() / divisor;
        let gamma = self.config.gamma;
        let offsets = geometry.channel_offsets();
        let tile_width = tensor.width();

        let mut raw = RawBuffer::zeroed(out_width, out_height);
        let tile_row_bytes = 2 * out_width * BYTES_PER_SAMPLE;
        raw.as_bytes_mut()
            .par_chunks_mut(tile_row_bytes)
            .zip(tensor.as_slice().par_chunks(tile_width * CHANNELS))
            .for_each(|(out_rows, cells)| {
                for (j, cell) in cells.chunks_exact(CHANNELS).enumerate() {
                    for (&value, &SlotOffset { row: dy, col: dx }) in cell.iter().zip(&offsets) {
                        let linear = clamp_unit(value).powf(gamma);
                        let sample = (linear * scale + black).round().clamp(0.0, u16::MAX as f32) as u16;
                        let at = byte_offset(out_width, dy, 2 * j + dx);
                        out_rows[at..at + BYTES_PER_SAMPLE].copy_from_slice(&sample.to_le_bytes());
                    }
                }
            });

        Ok(raw)
    }
}
