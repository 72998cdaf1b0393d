//! Capture request and completion types

use std::path::PathBuf;

use crate::image_pipeline::bayer::{BayerGeometry, BayerPattern};
use crate::image_pipeline::capture::guard::Lease;
use crate::image_pipeline::capture::pool::BufferPool;
use crate::image_pipeline::exposure::{ExposureSettings, GainRatio};
use crate::image_pipeline::raw::RawBuffer;

/// Correlation key of one issued capture.
pub type CaptureRequestId = u64;

/// Raw output configuration of the opened sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorLayout {
    pub width: usize,
    pub height: usize,
    pub pattern: BayerPattern,
}

impl SensorLayout {
    pub fn new(width: usize, height: usize, pattern: BayerPattern) -> Self {
        Self {
            width,
            height,
            pattern,
        }
    }
}

/// Destinations of the two artifacts written for a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Sensor output as captured
    pub original: PathBuf,
    /// Reconstruction from the inference engine output
    pub denoised: PathBuf,
}

/// Static metadata known when the capture is issued.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub layout: SensorLayout,
    pub geometry: BayerGeometry,
    pub requested: ExposureSettings,
    pub outputs: OutputPaths,
}

impl CaptureRequest {
    pub fn new(layout: SensorLayout, requested: ExposureSettings, outputs: OutputPaths) -> Self {
        Self {
            layout,
            geometry: layout.pattern.geometry(),
            requested,
            outputs,
        }
    }
}

/// A capture whose pixel buffer and metadata have both arrived.
#[derive(Debug)]
pub struct CompletedCapture {
    pub id: CaptureRequestId,
    pub request: CaptureRequest,
    /// Exposure auto-exposure judged correct for the scene
    pub ground_truth: ExposureSettings,
    pub gain: GainRatio,
    pub buffer: RawBuffer,
    /// Keeps the buffer pool alive until the save job ends
    pub lease: Lease<BufferPool>,
}
