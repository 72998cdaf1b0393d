use std::io::Write;

use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::writer::{ArtifactInfo, ArtifactWriter};

/// Writes the interleaved little-endian samples with no container.
pub struct PlainArtifactWriter;

impl ArtifactWriter for PlainArtifactWriter {
    fn write_raw(&self, raw: &RawBuffer, info: &ArtifactInfo, output: &mut dyn Write) -> Result<()> {
        debug!("Writing {} raw bytes for capture {}", raw.as_bytes().len(), info.id);
        output.write_all(raw.as_bytes())?;
        Ok(())
    }
}
