use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info};

use crate::image_pipeline::capture::{CompletedCapture, Dispatch};
use crate::image_pipeline::codec::RawTensorCodec;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::config::PipelineConfig;
use crate::image_pipeline::save::engine::InferenceEngine;
use crate::image_pipeline::save::job::{SaveContext, SaveJob};
use crate::image_pipeline::save::notify::CaptureListener;
use crate::image_pipeline::save::writer::{self, ArtifactWriter};

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Decrements the in-flight count when the job ends, panicking or not.
struct InFlightToken(Arc<InFlight>);

impl InFlightToken {
    fn acquire(in_flight: &Arc<InFlight>) -> Self {
        *in_flight.count.lock() += 1;
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Runs save jobs on a dedicated worker pool so that event delivery never blocks on inference
/// or disk writes.
pub struct SaveDispatcher {
    workers: ThreadPool,
    context: SaveContext,
    in_flight: Arc<InFlight>,
}

impl SaveDispatcher {
    pub fn new(
        config: &PipelineConfig,
        engine: Arc<dyn InferenceEngine>,
        listener: Arc<dyn CaptureListener>,
    ) -> Result<Self> {
        Self::with_custom(
            RawTensorCodec::new(config.codec)?,
            engine,
            writer::writer_for(config),
            listener,
            config.worker_threads,
        )
    }

    pub fn with_custom(
        codec: RawTensorCodec,
        engine: Arc<dyn InferenceEngine>,
        writer: Arc<dyn ArtifactWriter>,
        listener: Arc<dyn CaptureListener>,
        worker_threads: usize,
    ) -> Result<Self> {
        if worker_threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "at least one save worker is required".to_string(),
            ));
        }

        let workers = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("save-worker-{i}"))
            .panic_handler(|_| error!("Save worker panicked outside a job"))
            .build()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        info!(
            workers = worker_threads,
            engine = engine.name(),
            "Save dispatcher started"
        );

        Ok(Self {
            workers,
            context: SaveContext {
                codec: Arc::new(codec),
                engine,
                writer,
                listener,
            },
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Jobs dispatched and not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    /// Blocks until every dispatched job has finished.
    pub fn wait_idle(&self) {
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            self.in_flight.idle.wait(&mut count);
        }
    }
}

impl Dispatch for SaveDispatcher {
    fn dispatch(&self, capture: CompletedCapture) {
        debug!(request = capture.id, "Queueing save job");
        let token = InFlightToken::acquire(&self.in_flight);
        let job = SaveJob::new(capture, self.context.clone());
        self.workers.spawn(move || {
            let _token = token;
            job.run();
        });
    }
}
