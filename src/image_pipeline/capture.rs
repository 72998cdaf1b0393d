//! Capture side of the pipeline
//!
//! Tracks issued capture requests, joins the hardware's pixel-buffer and metadata events, and
//! keeps the buffer pool alive while completed captures are being saved.

mod correlator;
pub mod guard;
mod pool;
mod session;
pub mod types;


pub use correlator::{Dispatch, Progress, RequestCorrelator};
pub use guard::{Finalize, Lease, ResourceGuard};
pub use pool::BufferPool;
pub use session::CaptureSession;
pub use types::{CaptureRequest, CaptureRequestId, CompletedCapture, OutputPaths, SensorLayout};
