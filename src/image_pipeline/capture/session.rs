use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::image_pipeline::capture::correlator::{Progress, RequestCorrelator};
use crate::image_pipeline::capture::guard::ResourceGuard;
use crate::image_pipeline::capture::pool::BufferPool;
use crate::image_pipeline::capture::types::{CaptureRequest, CaptureRequestId, OutputPaths, SensorLayout};
use crate::image_pipeline::codec::RawTensorCodec;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::config::{ContainerFormat, PipelineConfig};
use crate::image_pipeline::exposure::ExposureSettings;
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::{
    ArtifactWriter, CaptureListener, InferenceEngine, SaveDispatcher, writer_for,
};

const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S_%3f";

/// An opened capture device: issues capture requests and accepts the hardware's events.
///
/// Event delivery methods may be called from any thread.
pub struct CaptureSession {
    next_id: AtomicU64,
    pool: Arc<ResourceGuard<BufferPool>>,
    correlator: RequestCorrelator,
    dispatcher: Arc<SaveDispatcher>,
    output_dir: PathBuf,
    container: ContainerFormat,
    closed: AtomicBool,
}

impl CaptureSession {
    pub fn open(
        config: PipelineConfig,
        engine: Arc<dyn InferenceEngine>,
        listener: Arc<dyn CaptureListener>,
    ) -> Result<Self> {
        let writer = writer_for(&config);
        Self::open_with_writer(config, engine, writer, listener)
    }

    pub fn open_with_writer(
        config: PipelineConfig,
        engine: Arc<dyn InferenceEngine>,
        writer: Arc<dyn ArtifactWriter>,
        listener: Arc<dyn CaptureListener>,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.output_dir)?;

        let dispatcher = Arc::new(SaveDispatcher::with_custom(
            RawTensorCodec::new(config.codec)?,
            engine,
            writer,
            listener,
            config.worker_threads,
        )?);
        let pool = ResourceGuard::new(BufferPool::new(config.pool_capacity));
        let correlator = RequestCorrelator::new(Arc::clone(&pool), dispatcher.clone());

        info!(
            output_dir = %config.output_dir.display(),
            container = ?config.container,
            pool_capacity = config.pool_capacity,
            "Capture session opened"
        );

        Ok(Self {
            next_id: AtomicU64::new(0),
            pool,
            correlator,
            dispatcher,
            output_dir: config.output_dir,
            container: config.container,
            closed: AtomicBool::new(false),
        })
    }

    /// Registers a new capture and returns the id the hardware events must carry.
    #[instrument(skip(self))]
    pub fn issue_capture(
        &self,
        layout: SensorLayout,
        requested_iso: u32,
        requested_exposure_ns: u64,
    ) -> Result<CaptureRequestId> {
        if self.is_closed() {
            return Err(PipelineError::ResourceUnavailable);
        }

        let requested = ExposureSettings::new(requested_iso, requested_exposure_ns);
        requested.validate()?;
        if layout.width == 0 || layout.height == 0 || layout.width % 2 != 0 || layout.height % 2 != 0 {
            return Err(PipelineError::InvalidDimensions(layout.width, layout.height));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let outputs = output_paths(&self.output_dir, self.container, id);
        self.correlator
            .register(id, CaptureRequest::new(layout, requested, outputs))?;
        Ok(id)
    }

    pub fn deliver_pixel_buffer(&self, id: CaptureRequestId, buffer: RawBuffer) -> Result<Progress> {
        self.correlator.on_pixel_buffer_ready(id, buffer)
    }

    pub fn deliver_metadata(
        &self,
        id: CaptureRequestId,
        gt_iso: u32,
        gt_exposure_ns: u64,
    ) -> Result<Progress> {
        self.correlator
            .on_metadata_ready(id, ExposureSettings::new(gt_iso, gt_exposure_ns))
    }

    /// Closes the device. The pool finalizes once every running save job has finished.
    ///
    /// Captures not yet dispatched are dropped, whichever event they were still waiting on.
    /// Calling this twice does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.correlator.close();
        self.pool.release();
        if dropped > 0 {
            warn!(dropped, "Captures abandoned on close");
        }
        info!(in_flight = self.dispatcher.in_flight(), "Capture session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Blocks until every dispatched save job has finished.
    pub fn wait_idle(&self) {
        self.dispatcher.wait_idle();
    }

    /// Records not yet dispatched.
    pub fn pending(&self) -> usize {
        self.correlator.len()
    }

    pub fn pool(&self) -> &Arc<ResourceGuard<BufferPool>> {
        &self.pool
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn output_paths(dir: &Path, container: ContainerFormat, id: CaptureRequestId) -> OutputPaths {
    let stem = format!("RAW_{}_{}", Local::now().format(TIMESTAMP_FORMAT), id);
    let ext = container.extension();
    OutputPaths {
        original: dir.join(format!("{stem}_ori_.{ext}")),
        denoised: dir.join(format!("{stem}.{ext}")),
    }
}
