use std::io::Write;
use std::sync::Arc;

use crate::image_pipeline::bayer::BayerPattern;
use crate::image_pipeline::capture::CaptureRequestId;
use crate::image_pipeline::codec::CodecConfig;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::config::{ContainerFormat, PipelineConfig};
use crate::image_pipeline::exposure::{ExposureSettings, GainRatio};
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::plain_writer::PlainArtifactWriter;
use crate::image_pipeline::save::tiff_writer::TiffArtifactWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Original,
    Denoised,
}

/// Capture properties recorded alongside an artifact.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub id: CaptureRequestId,
    pub kind: ArtifactKind,
    pub pattern: BayerPattern,
    pub codec: CodecConfig,
    pub requested: ExposureSettings,
    pub ground_truth: ExposureSettings,
    pub gain: GainRatio,
}

impl ArtifactInfo {
    pub fn description(&self) -> String {
        format!(
            "{} cfa={} black={} white={} iso={} exposure_ns={} ae_iso={} ae_exposure_ns={} gain={}",
            match self.kind {
                ArtifactKind::Original => "original",
                ArtifactKind::Denoised => "denoised",
            },
            self.pattern,
            self.codec.black_level,
            self.codec.white_level,
            self.requested.iso,
            self.requested.exposure_ns,
            self.ground_truth.iso,
            self.ground_truth.exposure_ns,
            self.gain.get()
        )
    }
}

pub trait ArtifactWriter: Send + Sync {
    fn write_raw(&self, raw: &RawBuffer, info: &ArtifactInfo, output: &mut dyn Write) -> Result<()>;
}

pub fn writer_for(config: &PipelineConfig) -> Arc<dyn ArtifactWriter> {
    match config.container {
        ContainerFormat::Tiff => Arc::new(TiffArtifactWriter::new(config.compression, config.predictor)),
        ContainerFormat::Plain => Arc::new(PlainArtifactWriter),
    }
}
