//! Pipeline configuration types

use std::path::PathBuf;

use crate::image_pipeline::codec::CodecConfig;
use crate::image_pipeline::common::error::{PipelineError, Result};

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Container the two raw artifacts are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Single-channel 16-bit TIFF of the CFA mosaic
    Tiff,
    /// Bare interleaved little-endian samples
    Plain,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Tiff => "tiff",
            ContainerFormat::Plain => "raw",
        }
    }
}

/// Number of raw images the hardware pool holds.
pub const DEFAULT_POOL_CAPACITY: usize = 10;
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Normalization constants and inverse behavior of the codec
    pub codec: CodecConfig,
    /// Captures that may await a pixel buffer before the oldest is dropped
    pub pool_capacity: usize,
    /// Save workers running inference and writes
    pub worker_threads: usize,
    /// Directory both artifacts are written to
    pub output_dir: PathBuf,
    pub container: ContainerFormat,
    /// Compression method for TIFF artifacts
    pub compression: TiffCompression,
    /// Predictor value for compression (2 for horizontal differencing)
    pub predictor: Option<u16>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            codec: CodecConfig::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            worker_threads: DEFAULT_WORKER_THREADS,
            output_dir: PathBuf::from("."),
            container: ContainerFormat::Tiff,
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;
        if self.pool_capacity == 0 {
            return Err(PipelineError::InvalidConfig("pool capacity must be at least 1".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(PipelineError::InvalidConfig("at least one save worker is required".to_string()));
        }
        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    black_level: Option<u16>,
    white_level: Option<u16>,
    gamma: Option<f32>,
    restore_exposure: Option<bool>,
    pool_capacity: Option<usize>,
    worker_threads: Option<usize>,
    output_dir: Option<PathBuf>,
    container: Option<ContainerFormat>,
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl PipelineConfigBuilder {
    pub fn black_level(mut self, level: u16) -> Self {
        self.black_level = Some(level);
        self
    }

    pub fn white_level(mut self, level: u16) -> Self {
        self.white_level = Some(level);
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn restore_exposure(mut self, restore: bool) -> Self {
        self.restore_exposure = Some(restore);
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = Some(capacity);
        self
    }

    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = Some(workers);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn container(mut self, container: ContainerFormat) -> Self {
        self.container = Some(container);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::default();
        PipelineConfig {
            codec: CodecConfig {
                black_level: self.black_level.unwrap_or(default.codec.black_level),
                white_level: self.white_level.unwrap_or(default.codec.white_level),
                gamma: self.gamma.unwrap_or(default.codec.gamma),
                restore_exposure: self.restore_exposure.unwrap_or(default.codec.restore_exposure),
            },
            pool_capacity: self.pool_capacity.unwrap_or(default.pool_capacity),
            worker_threads: self.worker_threads.unwrap_or(default.worker_threads),
            output_dir: self.output_dir.unwrap_or(default.output_dir),
            container: self.container.unwrap_or(default.container),
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}
