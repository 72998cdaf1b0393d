use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::image_pipeline::capture::guard::Finalize;

/// The hardware raw-image pool a capture session reads pixel buffers from.
///
/// `capacity` is the number of buffers the hardware can have outstanding at once.
#[derive(Debug)]
pub struct BufferPool {
    capacity: usize,
    closed: AtomicBool,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Finalize for BufferPool {
    fn finalize(&self) {
        self.closed.store(true, Ordering::Release);
        info!(capacity = self.capacity, "Buffer pool closed");
    }
}
