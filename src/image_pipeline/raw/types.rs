//! RAW buffer types

use crate::image_pipeline::bayer::BayerPattern;
use crate::image_pipeline::common::error::{PipelineError, Result};

/// Bytes per raw sample (16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Interleaved 16-bit sensor samples at full sensor resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    /// Width of the image in pixels
    width: usize,
    /// Height of the image in pixels
    height: usize,
    /// `width * height` little-endian samples, row-major
    data: Vec<u8>,
}

impl RawBuffer {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * BYTES_PER_SAMPLE;
        if data.len() != expected {
            return Err(PipelineError::DimensionMismatch(format!(
                "raw buffer {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * BYTES_PER_SAMPLE],
        }
    }

    pub fn from_samples(width: usize, height: usize, samples: &[u16]) -> Result<Self> {
        if samples.len() != width * height {
            return Err(PipelineError::DimensionMismatch(format!(
                "raw buffer {}x{} needs {} samples, got {}",
                width,
                height,
                width * height,
                samples.len()
            )));
        }
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Stride of one row in bytes.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width * BYTES_PER_SAMPLE
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> u16 {
        let offset = y * self.row_stride() + x * BYTES_PER_SAMPLE;
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub fn samples(&self) -> Vec<u16> {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// RAW frame decoded from a file, with the sensor properties needed to replay it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub buffer: RawBuffer,
    pub pattern: BayerPattern,
    /// Sensor floor reported by the file
    pub black_level: u16,
    /// Sensor ceiling reported by the file
    pub white_level: u16,
}
