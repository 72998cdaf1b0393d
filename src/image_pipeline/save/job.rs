use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{error, info, info_span, warn};

use crate::image_pipeline::capture::CompletedCapture;
use crate::image_pipeline::codec::RawTensorCodec;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::engine::InferenceEngine;
use crate::image_pipeline::save::notify::{CaptureListener, SavedCapture};
use crate::image_pipeline::save::timing::JobTimings;
use crate::image_pipeline::save::writer::{ArtifactInfo, ArtifactKind, ArtifactWriter};

/// Shared collaborators of every save job.
#[derive(Clone)]
pub struct SaveContext {
    pub codec: Arc<RawTensorCodec>,
    pub engine: Arc<dyn InferenceEngine>,
    pub writer: Arc<dyn ArtifactWriter>,
    pub listener: Arc<dyn CaptureListener>,
}

/// Denoises one completed capture and writes both artifacts.
pub struct SaveJob {
    capture: CompletedCapture,
    context: SaveContext,
}

impl SaveJob {
    pub fn new(capture: CompletedCapture, context: SaveContext) -> Self {
        Self { capture, context }
    }

    /// Runs the job to completion. Never panics; the pool token is released before the
    /// listener is notified, whatever the outcome.
    pub fn run(self) {
        let Self { capture, context } = self;
        let id = capture.id;
        let _span = info_span!("save_job", request = id).entered();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| process(&capture, &context)))
            .unwrap_or_else(|_| {
                Err(PipelineError::InferenceFailure("save job panicked".to_string()))
            });

        let gain = capture.gain;
        let outputs = capture.request.outputs.clone();
        capture.lease.release();

        let listener = context.listener.as_ref();
        let notified = panic::catch_unwind(AssertUnwindSafe(|| match outcome {
            Ok(timings) => {
                timings.log_summary();
                listener.on_saved(&SavedCapture {
                    id,
                    outputs,
                    gain,
                    timings,
                });
            }
            Err(e) => {
                error!(request = id, "Save job abandoned: {}", e);
                listener.on_failed(id, e.kind());
            }
        }));
        if notified.is_err() {
            error!(request = id, "Capture listener panicked");
        }
    }
}

fn process(capture: &CompletedCapture, context: &SaveContext) -> Result<JobTimings> {
    let mut timings = JobTimings::new();
    let geometry = &capture.request.geometry;
    let raw = &capture.buffer;

    info!(
        width = raw.width(),
        height = raw.height(),
        gain = %capture.gain,
        engine = context.engine.name(),
        "Processing capture"
    );

    let input = timings.measure("forward", || {
        let _span = info_span!("forward").entered();
        context.codec.forward(raw, geometry, capture.gain)
    })?;

    let output = timings.measure("infer", || {
        let _span = info_span!("infer").entered();
        context.engine.infer(&input)
    });
    let output = output.map_err(|e| PipelineError::InferenceFailure(format!("{:#}", e)))?;
    if output.shape() != input.shape() {
        return Err(PipelineError::InferenceFailure(format!(
            "engine returned shape {:?}, expected {:?}",
            output.shape(),
            input.shape()
        )));
    }
    let output = output.with_gain(input.gain());

    let denoised = timings.measure("inverse", || {
        let _span = info_span!("inverse").entered();
        context.codec.inverse(&output, geometry, raw.width(), raw.height())
    })?;

    timings.measure("write", || {
        let _span = info_span!("write").entered();
        write_artifacts(capture, context, &denoised)
    })?;

    Ok(timings)
}

fn artifact_info(capture: &CompletedCapture, context: &SaveContext, kind: ArtifactKind) -> ArtifactInfo {
    ArtifactInfo {
        id: capture.id,
        kind,
        pattern: capture.request.layout.pattern,
        codec: *context.codec.config(),
        requested: capture.request.requested,
        ground_truth: capture.ground_truth,
        gain: capture.gain,
    }
}

/// Writes both artifacts to temporary files, then moves them into place.
fn write_artifacts(capture: &CompletedCapture, context: &SaveContext, denoised: &RawBuffer) -> Result<()> {
    let outputs = &capture.request.outputs;

    let original = stage(
        &outputs.original,
        &capture.buffer,
        &artifact_info(capture, context, ArtifactKind::Original),
        context.writer.as_ref(),
    )?;
    let reconstructed = stage(
        &outputs.denoised,
        denoised,
        &artifact_info(capture, context, ArtifactKind::Denoised),
        context.writer.as_ref(),
    )?;

    original
        .persist(&outputs.original)
        .map_err(|e| PipelineError::WriteFailure(format!("{}: {}", outputs.original.display(), e)))?;

    if let Err(e) = reconstructed.persist(&outputs.denoised) {
        if let Err(cleanup) = std::fs::remove_file(&outputs.original) {
            warn!("Failed to remove {}: {}", outputs.original.display(), cleanup);
        }
        return Err(PipelineError::WriteFailure(format!("{}: {}", outputs.denoised.display(), e)));
    }

    Ok(())
}

fn stage(path: &Path, raw: &RawBuffer, info: &ArtifactInfo, writer: &dyn ArtifactWriter) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(dir)
        .map_err(|e| PipelineError::WriteFailure(format!("{}: {}", dir.display(), e)))?;
    writer.write_raw(raw, info, file.as_file_mut())?;
    file.as_file_mut().flush()?;

    Ok(file)
}
