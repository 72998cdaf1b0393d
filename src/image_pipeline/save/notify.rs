use tracing::{error, info};

use crate::image_pipeline::capture::{CaptureRequestId, OutputPaths};
use crate::image_pipeline::common::error::FailureKind;
use crate::image_pipeline::exposure::GainRatio;
use crate::image_pipeline::save::timing::JobTimings;

/// A capture whose two artifacts are on disk.
#[derive(Debug, Clone)]
pub struct SavedCapture {
    pub id: CaptureRequestId,
    pub outputs: OutputPaths,
    pub gain: GainRatio,
    pub timings: JobTimings,
}

/// Media index / UI side of the pipeline.
pub trait CaptureListener: Send + Sync {
    fn on_saved(&self, saved: &SavedCapture);
    fn on_failed(&self, id: CaptureRequestId, kind: FailureKind);
}

/// Listener that only logs.
pub struct LogListener;

impl CaptureListener for LogListener {
    fn on_saved(&self, saved: &SavedCapture) {
        info!(
            request = saved.id,
            original = %saved.outputs.original.display(),
            denoised = %saved.outputs.denoised.display(),
            "Capture saved in {:.3}ms",
            saved.timings.total_duration().as_secs_f64() * 1000.0
        );
    }

    fn on_failed(&self, id: CaptureRequestId, kind: FailureKind) {
        error!(request = id, ?kind, "Capture failed");
    }
}
