use std::io::Write;

use tiff::encoder::colortype::Gray16;
use tiff::tags::Tag;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::config::TiffCompression;
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::writer::{ArtifactInfo, ArtifactWriter};

/// Writes the CFA mosaic as a single-channel 16-bit TIFF.
pub struct TiffArtifactWriter {
    compression: TiffCompression,
    predictor: Option<u16>,
}

impl TiffArtifactWriter {
    pub fn new(compression: TiffCompression, predictor: Option<u16>) -> Self {
        Self {
            compression,
            predictor,
        }
    }
}

impl ArtifactWriter for TiffArtifactWriter {
    fn write_raw(&self, raw: &RawBuffer, info: &ArtifactInfo, output: &mut dyn Write) -> Result<()> {
        debug!(
            "Encoding TIFF artifact for capture {}: {}x{}",
            info.id,
            raw.width(),
            raw.height()
        );

        let mut buffer = Vec::new();

        let compression = match self.compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::WriteFailure(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = self.predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        let samples = raw.samples();
        let description = info.description();

        let mut image = encoder
            .new_image::<Gray16>(raw.width() as u32, raw.height() as u32)
            .map_err(|e| PipelineError::WriteFailure(e.to_string()))?;
        image
            .encoder()
            .write_tag(Tag::ImageDescription, description.as_str())
            .map_err(|e| PipelineError::WriteFailure(e.to_string()))?;
        image
            .encoder()
            .write_tag(Tag::Software, concat!("raw_denoise_rs ", env!("CARGO_PKG_VERSION")))
            .map_err(|e| PipelineError::WriteFailure(e.to_string()))?;
        image
            .write_data(&samples)
            .map_err(|e| PipelineError::WriteFailure(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}
