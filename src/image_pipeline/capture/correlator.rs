//! Joins pixel-buffer and capture-metadata events into complete captures.
//!
//! Both events carry the request id and may arrive in either order from any thread. A record
//! is removed from the table in the same critical section that observes it complete, so each
//! id reaches the dispatcher at most once.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::image_pipeline::capture::guard::{Lease, ResourceGuard};
use crate::image_pipeline::capture::pool::BufferPool;
use crate::image_pipeline::capture::types::{CaptureRequest, CaptureRequestId, CompletedCapture};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::exposure::{self, ExposureSettings, GainRatio};
use crate::image_pipeline::raw::RawBuffer;

/// Receives completed captures. Called outside the correlator lock.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, capture: CompletedCapture);
}

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Recorded, the other half is still outstanding
    Waiting,
    /// Complete and handed to the dispatcher
    Dispatched,
    /// Discarded: unknown id or pool already finalized
    Dropped,
}

enum Arrival {
    AwaitingBoth,
    AwaitingBuffer {
        ground_truth: ExposureSettings,
        gain: GainRatio,
    },
    AwaitingMetadata {
        buffer: RawBuffer,
        lease: Lease<BufferPool>,
    },
}

impl Arrival {
    fn needs_buffer(&self) -> bool {
        !matches!(self, Arrival::AwaitingMetadata { .. })
    }
}

struct PendingRecord {
    request: CaptureRequest,
    arrival: Arrival,
}

#[derive(Default)]
struct PendingTable {
    records: BTreeMap<CaptureRequestId, PendingRecord>,
    /// Set once by `close`; no record is accepted afterwards
    closed: bool,
}

pub struct RequestCorrelator {
    pending: Mutex<PendingTable>,
    pool: Arc<ResourceGuard<BufferPool>>,
    dispatcher: Arc<dyn Dispatch>,
}

impl RequestCorrelator {
    pub fn new(pool: Arc<ResourceGuard<BufferPool>>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            pending: Mutex::new(PendingTable::default()),
            pool,
            dispatcher,
        }
    }

    /// Adds a pending record for `id`.
    ///
    /// When more records are waiting on a pixel buffer than the pool can hold, the oldest of
    /// them is dropped. Fails with `ResourceUnavailable` once the correlator is closed, or when
    /// `id` is itself the oldest and would be dropped straight away.
    #[instrument(skip(self, request), fields(pattern = %request.layout.pattern))]
    pub fn register(&self, id: CaptureRequestId, request: CaptureRequest) -> Result<()> {
        request.requested.validate()?;

        let capacity = self.pool.get().capacity();
        let mut table = self.pending.lock();
        if table.closed {
            return Err(PipelineError::ResourceUnavailable);
        }
        let pending = &mut table.records;
        if pending.contains_key(&id) {
            return Err(PipelineError::DuplicateRequest(id));
        }

        let mut awaiting: Vec<CaptureRequestId> = pending
            .iter()
            .filter(|(_, record)| record.arrival.needs_buffer())
            .map(|(&key, _)| key)
            .collect();
        awaiting.push(id);
        awaiting.sort_unstable();
        let excess = awaiting.len().saturating_sub(capacity);
        let evicted = &awaiting[..excess];
        if evicted.contains(&id) {
            warn!(
                request = id,
                capacity, "Capture is older than every pending capture and the backlog is full"
            );
            return Err(PipelineError::ResourceUnavailable);
        }

        pending.insert(
            id,
            PendingRecord {
                request,
                arrival: Arrival::AwaitingBoth,
            },
        );
        for &oldest in evicted {
            pending.remove(&oldest);
            warn!(
                request = oldest,
                capacity, "Too many captures awaiting pixel buffers, dropping oldest"
            );
        }

        debug!(request = id, pending = pending.len(), "Capture registered");
        Ok(())
    }

    #[instrument(skip(self, buffer), fields(width = buffer.width(), height = buffer.height()))]
    pub fn on_pixel_buffer_ready(&self, id: CaptureRequestId, buffer: RawBuffer) -> Result<Progress> {
        let completed = {
            let mut table = self.pending.lock();
            let pending = &mut table.records;
            let Some(record) = pending.remove(&id) else {
                warn!(request = id, "Pixel buffer for unknown capture, dropping");
                return Ok(Progress::Dropped);
            };

            let layout = record.request.layout;
            if buffer.width() != layout.width || buffer.height() != layout.height {
                warn!(request = id, "Pixel buffer does not match the sensor layout, dropping capture");
                return Err(PipelineError::DimensionMismatch(format!(
                    "capture {} expects {}x{}, got {}x{}",
                    id,
                    layout.width,
                    layout.height,
                    buffer.width(),
                    buffer.height()
                )));
            }

            let Some(lease) = self.pool.retain() else {
                warn!(request = id, "Buffer pool already closed before the image could be saved, dropping capture");
                return Ok(Progress::Dropped);
            };

            let PendingRecord { request, arrival } = record;
            let duplicate = matches!(arrival, Arrival::AwaitingMetadata { .. });
            match arrival {
                Arrival::AwaitingBuffer { ground_truth, gain } => CompletedCapture {
                    id,
                    request,
                    ground_truth,
                    gain,
                    buffer,
                    lease,
                },
                Arrival::AwaitingBoth | Arrival::AwaitingMetadata { .. } => {
                    if duplicate {
                        warn!(request = id, "Duplicate pixel buffer, replacing the earlier one");
                    }
                    pending.insert(
                        id,
                        PendingRecord {
                            request,
                            arrival: Arrival::AwaitingMetadata { buffer, lease },
                        },
                    );
                    return Ok(Progress::Waiting);
                }
            }
        };

        self.hand_off(completed);
        Ok(Progress::Dispatched)
    }

    #[instrument(skip(self))]
    pub fn on_metadata_ready(
        &self,
        id: CaptureRequestId,
        ground_truth: ExposureSettings,
    ) -> Result<Progress> {
        let completed = {
            let mut table = self.pending.lock();
            let pending = &mut table.records;
            let Some(record) = pending.remove(&id) else {
                warn!(request = id, "Metadata for unknown capture, ignoring");
                return Ok(Progress::Dropped);
            };
            let gain = match exposure::compute_ratio(ground_truth, record.request.requested) {
                Ok(gain) => gain,
                Err(e) => {
                    pending.insert(id, record);
                    return Err(e);
                }
            };

            let PendingRecord { request, arrival } = record;
            let duplicate = matches!(arrival, Arrival::AwaitingBuffer { .. });
            match arrival {
                Arrival::AwaitingMetadata { buffer, lease } => CompletedCapture {
                    id,
                    request,
                    ground_truth,
                    gain,
                    buffer,
                    lease,
                },
                Arrival::AwaitingBoth | Arrival::AwaitingBuffer { .. } => {
                    if duplicate {
                        warn!(request = id, "Duplicate capture metadata, replacing the earlier one");
                    }
                    pending.insert(
                        id,
                        PendingRecord {
                            request,
                            arrival: Arrival::AwaitingBuffer { ground_truth, gain },
                        },
                    );
                    return Ok(Progress::Waiting);
                }
            }
        };

        self.hand_off(completed);
        Ok(Progress::Dispatched)
    }

    /// Stops accepting captures and drops every pending record, releasing the leases of those
    /// already holding a pixel buffer. Returns how many were dropped.
    ///
    /// Captures already handed to the dispatcher are unaffected.
    pub fn close(&self) -> usize {
        // Leases go back to the pool when `drained` drops, outside the table lock
        let drained = {
            let mut table = self.pending.lock();
            table.closed = true;
            std::mem::take(&mut table.records)
        };

        for (&id, record) in &drained {
            if record.arrival.needs_buffer() {
                warn!(request = id, "Capture never received a pixel buffer, dropping");
            } else {
                warn!(request = id, "Capture still awaiting metadata on close, dropping");
            }
        }
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    pub fn len(&self) -> usize {
        self.pending.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().records.is_empty()
    }

    /// Pending ids, oldest first.
    pub fn pending_ids(&self) -> Vec<CaptureRequestId> {
        self.pending.lock().records.keys().copied().collect()
    }

    fn hand_off(&self, capture: CompletedCapture) {
        debug!(request = capture.id, gain = %capture.gain, "Capture complete, dispatching");
        self.dispatcher.dispatch(capture);
    }
}
