//! RAW file reader backed by the rawloader library.
//!
//! Decodes camera RAW files (ARW, CR2, NEF, DNG, ...) into a [`RawFrame`] that can be fed to a
//! capture session in place of live sensor output.

use std::io::Cursor;

use rawloader::RawImageData as RawloaderImageData;
use tracing::debug;

use crate::image_pipeline::bayer::BayerPattern;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::types::{RawBuffer, RawFrame};

/// RAW image reader that uses the rawloader library for decoding.
///
/// Only single-component Bayer files are accepted. The mosaic is cropped to even dimensions so
/// every 2x2 tile is complete.
pub struct RawLoaderReader;

impl RawImageReader for RawLoaderReader {
    fn read_raw(&self, data: &[u8]) -> Result<RawFrame> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        if decoded.cpp != 1 {
            return Err(PipelineError::DecodeError(format!(
                "expected a single-component mosaic, got {} components per pixel",
                decoded.cpp
            )));
        }

        let pattern: BayerPattern = decoded.cfa.name.parse()?;

        let width = decoded.width;
        let height = decoded.height;
        let even_width = width & !1;
        let even_height = height & !1;
        if even_width == 0 || even_height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }

        debug!("Decoded image: {}x{} ({})", width, height, pattern);

        // Float data is normalized to 0.0-1.0, scale it into the sensor range
        let white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let samples: Vec<u16> = match decoded.data {
            RawloaderImageData::Integer(values) => values,
            RawloaderImageData::Float(values) => values
                .iter()
                .map(|&v| (v.clamp(0.0, 1.0) * white_level as f32).round() as u16)
                .collect(),
        };

        let cropped: Vec<u16> = if even_width == width && even_height == height {
            samples
        } else {
            samples
                .chunks_exact(width)
                .take(even_height)
                .flat_map(|row| row[..even_width].iter().copied())
                .collect()
        };

        let black_level = decoded.blacklevels.iter().min().copied().unwrap_or(0);

        debug!(
            "Frame levels: black={}, white={}, cropped to {}x{}",
            black_level, white_level, even_width, even_height
        );

        Ok(RawFrame {
            buffer: RawBuffer::from_samples(even_width, even_height, &cropped)?,
            pattern,
            black_level,
            white_level,
        })
    }
}
