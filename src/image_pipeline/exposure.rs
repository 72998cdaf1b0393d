//! Exposure ratio policy
//!
//! Derives the brightening factor applied before inference from the exposure auto-exposure
//! judged correct versus the manual exposure the user actually requested.

use std::fmt;

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Sensor sensitivity and exposure time of one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureSettings {
    pub iso: u32,
    pub exposure_ns: u64,
}

impl ExposureSettings {
    pub fn new(iso: u32, exposure_ns: u64) -> Self {
        Self { iso, exposure_ns }
    }

    /// Gain-time product; `u128` so nanosecond exposures never overflow.
    #[inline]
    pub fn gain_time(&self) -> u128 {
        self.iso as u128 * self.exposure_ns as u128
    }

    /// Rejects settings whose gain-time product is zero.
    pub fn validate(&self) -> Result<()> {
        if self.gain_time() == 0 {
            return Err(PipelineError::InvalidExposure {
                iso: self.iso,
                exposure_ns: self.exposure_ns,
            });
        }
        Ok(())
    }
}

/// Brightening factor, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GainRatio(u32);

impl GainRatio {
    pub const UNITY: GainRatio = GainRatio(1);

    pub fn new(ratio: u32) -> Result<Self> {
        if ratio == 0 {
            return Err(PipelineError::InvalidConfig("gain ratio must be at least 1".to_string()));
        }
        Ok(Self(ratio))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.0 as f32
    }
}

impl Default for GainRatio {
    fn default() -> Self {
        Self::UNITY
    }
}

impl fmt::Display for GainRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// `floor(ground_truth / requested)` over gain-time products, clamped to a minimum of 1.
///
/// A zero requested product is a caller contract violation.
pub fn compute_ratio(ground_truth: ExposureSettings, requested: ExposureSettings) -> Result<GainRatio> {
    requested.validate()?;

    let ratio = ground_truth.gain_time() / requested.gain_time();
    let ratio = u32::try_from(ratio).unwrap_or(u32::MAX).max(1);

    Ok(GainRatio(ratio))
}
