//! Codec parameters and the tensor exchanged with the inference engine

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::exposure::GainRatio;

/// Number of tensor channels: `[R, G1, B, G2]`.
pub const CHANNELS: usize = 4;

pub const DEFAULT_BLACK_LEVEL: u16 = 64;
pub const DEFAULT_WHITE_LEVEL: u16 = 1024;
pub const DEFAULT_GAMMA: f32 = 2.22;

/// Normalization constants of the sensor domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecConfig {
    /// Sensor floor subtracted before normalization
    pub black_level: u16,
    /// Sensor ceiling mapped to 1.0
    pub white_level: u16,
    /// Forward encodes with `1/gamma`, inverse decodes with `gamma`
    pub gamma: f32,
    /// Divide the gain back out in the inverse transform.
    ///
    /// When false the reconstructed raw keeps the brightened exposure.
    pub restore_exposure: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            black_level: DEFAULT_BLACK_LEVEL,
            white_level: DEFAULT_WHITE_LEVEL,
            gamma: DEFAULT_GAMMA,
            restore_exposure: true,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.white_level <= self.black_level {
            return Err(PipelineError::InvalidConfig(format!(
                "white level {} must exceed black level {}",
                self.white_level, self.black_level
            )));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn range(&self) -> f32 {
        (self.white_level - self.black_level) as f32
    }
}

/// Channel-last `[R, G1, B, G2]` tensor over the 2x2 tile grid, values nominally in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    /// Tile rows (raw height / 2)
    height: usize,
    /// Tile columns (raw width / 2)
    width: usize,
    /// Gain the values were brightened with
    gain: GainRatio,
    data: Vec<f32>,
}

impl NormalizedTensor {
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        let expected = height * width * CHANNELS;
        if data.len() != expected {
            return Err(PipelineError::DimensionMismatch(format!(
                "tensor {}x{}x{} needs {} values, got {}",
                height,
                width,
                CHANNELS,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            height,
            width,
            gain: GainRatio::UNITY,
            data,
        })
    }

    pub fn zeroed(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            gain: GainRatio::UNITY,
            data: vec![0.0; height * width * CHANNELS],
        }
    }

    pub fn with_gain(mut self, gain: GainRatio) -> Self {
        self.gain = gain;
        self
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn gain(&self) -> GainRatio {
        self.gain
    }

    /// `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, CHANNELS]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn at(&self, i: usize, j: usize, channel: usize) -> f32 {
        self.data[(i * self.width + j) * CHANNELS + channel]
    }
}
