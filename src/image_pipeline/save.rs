//! Save stage
//!
//! A completed capture is normalized, denoised by the inference engine, reconstructed, and
//! written next to the untouched original. Jobs run on their own worker pool.

pub mod dispatcher;
pub mod engine;
mod job;
pub mod notify;
mod plain_writer;
pub mod timing;
mod tiff_writer;
pub mod writer;

#[cfg(test)]
mod tests;

pub use dispatcher::SaveDispatcher;
pub use engine::{InferenceEngine, PassthroughEngine};
pub use job::{SaveContext, SaveJob};
pub use notify::{CaptureListener, LogListener, SavedCapture};
pub use plain_writer::PlainArtifactWriter;
pub use tiff_writer::TiffArtifactWriter;
pub use timing::{JobTimings, StepTiming, Timer};
pub use writer::{ArtifactInfo, ArtifactKind, ArtifactWriter, writer_for};
