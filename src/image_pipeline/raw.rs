//! RAW buffer module
//!
//! The interleaved sensor buffer exchanged with the capture hardware, and a file-backed reader
//! that produces the same buffers from camera RAW files.

mod reader;
mod rawloader_reader;
pub mod types;

pub use reader::RawImageReader;
pub use rawloader_reader::RawLoaderReader;
pub use types::{BYTES_PER_SAMPLE, RawBuffer, RawFrame};
