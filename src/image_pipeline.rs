//! Low-light denoise capture pipeline
//!
//! Captures are issued with a manual exposure, joined with the exposure auto-exposure judged
//! correct, brightened and normalized into a tensor, run through an inference engine, and
//! written back as raw artifacts next to the untouched original.

pub mod bayer;
pub mod capture;
pub mod codec;
pub mod common;
pub mod config;
pub mod exposure;
pub mod raw;
pub mod save;

pub use common::{FailureKind, PipelineError, Result};

pub use bayer::{BayerGeometry, BayerPattern};

pub use capture::{
    CaptureRequestId,
    CaptureSession,
    Progress,
    SensorLayout,
};

pub use codec::{CodecConfig, NormalizedTensor, RawTensorCodec};

pub use config::{
    ContainerFormat,
    PipelineConfig,
    PipelineConfigBuilder,
    TiffCompression,
};

pub use exposure::{ExposureSettings, GainRatio, compute_ratio};

pub use raw::{RawBuffer, RawFrame, RawImageReader, RawLoaderReader};

pub use save::{
    CaptureListener,
    InferenceEngine,
    LogListener,
    PassthroughEngine,
    SavedCapture,
};
