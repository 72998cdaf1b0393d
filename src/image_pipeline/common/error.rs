use thiserror::Error;

use crate::image_pipeline::capture::CaptureRequestId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown color filter pattern: {0}")]
    UnknownPattern(String),

    #[error("Invalid exposure: iso={iso}, exposure_ns={exposure_ns}")]
    InvalidExposure { iso: u32, exposure_ns: u64 },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Buffer pool already finalized")]
    ResourceUnavailable,

    #[error("Capture request {0} is already registered")]
    DuplicateRequest(CaptureRequestId),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Failed to write output artifact: {0}")]
    WriteFailure(String),

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to decode RAW image: {0}")]
    DecodeError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse error category surfaced to the indexing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UnknownPattern,
    InvalidExposure,
    DimensionMismatch,
    ResourceUnavailable,
    InferenceFailure,
    WriteFailure,
    Other,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::UnknownPattern(_) => FailureKind::UnknownPattern,
            PipelineError::InvalidExposure { .. } => FailureKind::InvalidExposure,
            PipelineError::DimensionMismatch(_) | PipelineError::InvalidDimensions(_, _) => {
                FailureKind::DimensionMismatch
            }
            PipelineError::ResourceUnavailable => FailureKind::ResourceUnavailable,
            PipelineError::InferenceFailure(_) => FailureKind::InferenceFailure,
            PipelineError::WriteFailure(_) | PipelineError::IoError(_) => FailureKind::WriteFailure,
            PipelineError::DuplicateRequest(_)
            | PipelineError::InputReadError(_)
            | PipelineError::DecodeError(_)
            | PipelineError::InvalidConfig(_) => FailureKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
