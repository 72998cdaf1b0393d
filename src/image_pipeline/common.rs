//! Common utilities module
//!
//! Shared error types used across the capture pipeline.

pub mod error;

pub use error::{FailureKind, PipelineError, Result};
