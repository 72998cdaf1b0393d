use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;

use raw_denoise_rs::image_pipeline::{
    CaptureSession, ContainerFormat, LogListener, PassthroughEngine, PipelineConfig, Progress,
    RawImageReader, RawLoaderReader, SensorLayout,
};
use raw_denoise_rs::logger;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Container {
    Tiff,
    Plain,
}

impl From<Container> for ContainerFormat {
    fn from(container: Container) -> Self {
        match container {
            Container::Tiff => ContainerFormat::Tiff,
            Container::Plain => ContainerFormat::Plain,
        }
    }
}

/// Replays a camera RAW file through the denoise pipeline as if it came from the sensor.
#[derive(Parser)]
#[command(name = "raw-denoise")]
#[command(version)]
struct Cli {
    /// Camera RAW file to replay
    input: PathBuf,

    /// Directory the original and denoised artifacts are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// ISO the capture was requested with
    #[arg(long, default_value = "100")]
    iso: u32,

    /// Exposure time the capture was requested with, in nanoseconds
    #[arg(long, default_value = "10000000")]
    exposure_ns: u64,

    /// ISO auto-exposure judged correct
    #[arg(long, default_value = "800")]
    gt_iso: u32,

    /// Exposure time auto-exposure judged correct, in nanoseconds
    #[arg(long, default_value = "10000000")]
    gt_exposure_ns: u64,

    /// Override the black level read from the file
    #[arg(long)]
    black_level: Option<u16>,

    /// Override the white level read from the file
    #[arg(long)]
    white_level: Option<u16>,

    /// Save worker threads
    #[arg(short, long, default_value = "2")]
    threads: usize,

    #[arg(short, long, value_enum, default_value = "tiff")]
    container: Container,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    let data = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let frame = RawLoaderReader
        .read_raw(&data)
        .with_context(|| format!("failed to decode {}", cli.input.display()))?;
    let layout = SensorLayout::new(frame.buffer.width(), frame.buffer.height(), frame.pattern);

    let config = PipelineConfig::builder()
        .black_level(cli.black_level.unwrap_or(frame.black_level))
        .white_level(cli.white_level.unwrap_or(frame.white_level))
        .output_dir(&cli.output_dir)
        .container(cli.container.into())
        .worker_threads(cli.threads)
        .build();

    info!(
        "Replaying {}: {}x{} {}, levels {}..{}",
        cli.input.display(),
        layout.width,
        layout.height,
        layout.pattern,
        config.codec.black_level,
        config.codec.white_level
    );

    let session = Arc::new(CaptureSession::open(
        config,
        Arc::new(PassthroughEngine),
        Arc::new(LogListener),
    )?);
    let id = session.issue_capture(layout, cli.iso, cli.exposure_ns)?;

    let metadata = {
        let session = Arc::clone(&session);
        let (gt_iso, gt_exposure_ns) = (cli.gt_iso, cli.gt_exposure_ns);
        thread::Builder::new()
            .name("metadata-callback".to_string())
            .spawn(move || session.deliver_metadata(id, gt_iso, gt_exposure_ns))?
    };
    let pixels = {
        let session = Arc::clone(&session);
        let buffer = frame.buffer;
        thread::Builder::new()
            .name("image-callback".to_string())
            .spawn(move || session.deliver_pixel_buffer(id, buffer))?
    };

    let mut dispatched = false;
    for handle in [metadata, pixels] {
        let progress = match handle.join() {
            Ok(progress) => progress?,
            Err(_) => bail!("capture callback thread panicked"),
        };
        dispatched |= progress == Progress::Dispatched;
    }
    if !dispatched {
        bail!("capture {id} was never dispatched");
    }

    session.wait_idle();
    session.close();
    Ok(())
}
