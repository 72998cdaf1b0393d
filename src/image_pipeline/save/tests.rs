use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::image_pipeline::bayer::BayerPattern;
use crate::image_pipeline::capture::{
    BufferPool, CaptureRequest, CaptureRequestId, CompletedCapture, Dispatch, OutputPaths,
    ResourceGuard, SensorLayout,
};
use crate::image_pipeline::codec::{CodecConfig, NormalizedTensor, RawTensorCodec};
use crate::image_pipeline::common::error::{FailureKind, PipelineError, Result};
use crate::image_pipeline::config::TiffCompression;
use crate::image_pipeline::exposure::{ExposureSettings, GainRatio};
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::save::{
    ArtifactInfo, ArtifactKind, ArtifactWriter, CaptureListener, InferenceEngine,
    PassthroughEngine, PlainArtifactWriter, SaveContext, SaveDispatcher, SaveJob, SavedCapture,
    TiffArtifactWriter,
};

const WIDTH: usize = 8;
const HEIGHT: usize = 6;

enum EngineMode {
    Fail,
    Panic,
    WrongShape,
}

struct MockEngine {
    mode: EngineMode,
}

impl InferenceEngine for MockEngine {
    fn infer(&self, input: &NormalizedTensor) -> anyhow::Result<NormalizedTensor> {
        match self.mode {
            EngineMode::Fail => anyhow::bail!("mock engine failure"),
            EngineMode::Panic => panic!("mock engine panic"),
            EngineMode::WrongShape => Ok(NormalizedTensor::zeroed(input.height() + 1, input.width())),
        }
    }
}

struct FailingWriter;

impl ArtifactWriter for FailingWriter {
    fn write_raw(&self, _raw: &RawBuffer, _info: &ArtifactInfo, _output: &mut dyn Write) -> Result<()> {
        Err(PipelineError::WriteFailure("mock write failure".to_string()))
    }
}

/// Writes normally but records what it was asked to write.
#[derive(Default)]
struct RecordingWriter {
    kinds: Mutex<Vec<ArtifactKind>>,
}

impl ArtifactWriter for RecordingWriter {
    fn write_raw(&self, raw: &RawBuffer, info: &ArtifactInfo, output: &mut dyn Write) -> Result<()> {
        self.kinds.lock().push(info.kind);
        PlainArtifactWriter.write_raw(raw, info, output)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Saved(CaptureRequestId),
    Failed(CaptureRequestId, FailureKind),
}

/// Records notifications along with the pool's token count at the time of the call.
struct RecordingListener {
    pool: Arc<ResourceGuard<BufferPool>>,
    events: Mutex<Vec<(Event, Option<i64>)>>,
    saved: Mutex<Vec<SavedCapture>>,
}

impl RecordingListener {
    fn new(pool: &Arc<ResourceGuard<BufferPool>>) -> Arc<Self> {
        Arc::new(Self {
            pool: Arc::clone(pool),
            events: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().iter().map(|(e, _)| e.clone()).collect()
    }
}

impl CaptureListener for RecordingListener {
    fn on_saved(&self, saved: &SavedCapture) {
        self.events
            .lock()
            .push((Event::Saved(saved.id), self.pool.ref_count()));
        self.saved.lock().push(saved.clone());
    }

    fn on_failed(&self, id: CaptureRequestId, kind: FailureKind) {
        self.events
            .lock()
            .push((Event::Failed(id, kind), self.pool.ref_count()));
    }
}

fn gradient(ratio: u32) -> RawBuffer {
    let ceiling = 64 + 960 / ratio as u16;
    let span = (ceiling - 64) as usize + 1;
    let samples: Vec<u16> = (0..WIDTH * HEIGHT)
        .map(|i| 64 + ((i * 29) % span) as u16)
        .collect();
    RawBuffer::from_samples(WIDTH, HEIGHT, &samples).unwrap()
}

fn outputs_in(dir: &Path, id: CaptureRequestId) -> OutputPaths {
    OutputPaths {
        original: dir.join(format!("RAW_test_{id}_ori_.raw")),
        denoised: dir.join(format!("RAW_test_{id}.raw")),
    }
}

fn completed(
    id: CaptureRequestId,
    outputs: OutputPaths,
    pool: &Arc<ResourceGuard<BufferPool>>,
    ratio: u32,
) -> CompletedCapture {
    let layout = SensorLayout::new(WIDTH, HEIGHT, BayerPattern::Rggb);
    let requested = ExposureSettings::new(100, 10_000_000);
    CompletedCapture {
        id,
        request: CaptureRequest::new(layout, requested, outputs),
        ground_truth: ExposureSettings::new(100 * ratio, 10_000_000),
        gain: GainRatio::new(ratio).unwrap(),
        buffer: gradient(ratio),
        lease: pool.retain().unwrap(),
    }
}

fn context(
    engine: Arc<dyn InferenceEngine>,
    writer: Arc<dyn ArtifactWriter>,
    listener: Arc<dyn CaptureListener>,
) -> SaveContext {
    SaveContext {
        codec: Arc::new(RawTensorCodec::new(CodecConfig::default()).unwrap()),
        engine,
        writer,
        listener,
    }
}

fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_successful_save_writes_both_artifacts() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);
    let writer = Arc::new(RecordingWriter::default());
    let outputs = outputs_in(dir.path(), 3);

    let capture = completed(3, outputs.clone(), &pool, 2);
    let original = capture.buffer.clone();
    assert_eq!(pool.ref_count(), Some(1));

    SaveJob::new(
        capture,
        context(Arc::new(PassthroughEngine), writer.clone(), listener.clone()),
    )
    .run();

    // Lease already returned when the listener ran
    assert_eq!(*listener.events.lock(), vec![(Event::Saved(3), Some(0))]);
    assert_eq!(pool.ref_count(), Some(0));
    assert_eq!(*writer.kinds.lock(), vec![ArtifactKind::Original, ArtifactKind::Denoised]);

    let written = std::fs::read(&outputs.original).unwrap();
    assert_eq!(written, original.as_bytes());

    let denoised = RawBuffer::new(WIDTH, HEIGHT, std::fs::read(&outputs.denoised).unwrap()).unwrap();
    for (a, b) in original.samples().iter().zip(denoised.samples()) {
        assert!((*a as i32 - b as i32).abs() <= 1, "{a} came back as {b}");
    }

    assert_eq!(dir_entries(dir.path()), 2);

    let saved = listener.saved.lock();
    assert_eq!(saved[0].outputs, outputs);
    assert_eq!(saved[0].gain.get(), 2);
    for step in ["forward", "infer", "inverse", "write"] {
        assert!(saved[0].timings.get_step(step).is_some(), "missing step {step}");
    }
}

#[test]
fn test_engine_failure_reports_inference_failure() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    SaveJob::new(
        completed(1, outputs_in(dir.path(), 1), &pool, 1),
        context(
            Arc::new(MockEngine { mode: EngineMode::Fail }),
            Arc::new(PlainArtifactWriter),
            listener.clone(),
        ),
    )
    .run();

    assert_eq!(listener.events(), vec![Event::Failed(1, FailureKind::InferenceFailure)]);
    assert_eq!(pool.ref_count(), Some(0));
    assert_eq!(dir_entries(dir.path()), 0);
}

#[test]
fn test_engine_panic_is_contained() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    SaveJob::new(
        completed(2, outputs_in(dir.path(), 2), &pool, 1),
        context(
            Arc::new(MockEngine { mode: EngineMode::Panic }),
            Arc::new(PlainArtifactWriter),
            listener.clone(),
        ),
    )
    .run();

    assert_eq!(*listener.events.lock(), vec![(Event::Failed(2, FailureKind::InferenceFailure), Some(0))]);
    assert_eq!(dir_entries(dir.path()), 0);
}

#[test]
fn test_engine_shape_change_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    SaveJob::new(
        completed(4, outputs_in(dir.path(), 4), &pool, 1),
        context(
            Arc::new(MockEngine { mode: EngineMode::WrongShape }),
            Arc::new(PlainArtifactWriter),
            listener.clone(),
        ),
    )
    .run();

    assert_eq!(listener.events(), vec![Event::Failed(4, FailureKind::InferenceFailure)]);
    assert_eq!(dir_entries(dir.path()), 0);
}

#[test]
fn test_writer_failure_leaves_no_files() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    SaveJob::new(
        completed(5, outputs_in(dir.path(), 5), &pool, 1),
        context(Arc::new(PassthroughEngine), Arc::new(FailingWriter), listener.clone()),
    )
    .run();

    assert_eq!(*listener.events.lock(), vec![(Event::Failed(5, FailureKind::WriteFailure), Some(0))]);
    assert_eq!(dir_entries(dir.path()), 0);
}

#[test]
fn test_unwritable_denoised_path_keeps_original_off_disk() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);
    let outputs = OutputPaths {
        original: dir.path().join("RAW_test_6_ori_.raw"),
        denoised: dir.path().join("missing").join("RAW_test_6.raw"),
    };

    SaveJob::new(
        completed(6, outputs.clone(), &pool, 1),
        context(
            Arc::new(PassthroughEngine),
            Arc::new(PlainArtifactWriter),
            listener.clone(),
        ),
    )
    .run();

    assert_eq!(listener.events(), vec![Event::Failed(6, FailureKind::WriteFailure)]);
    assert!(!outputs.original.exists());
    assert_eq!(dir_entries(dir.path()), 0);
}

#[test]
fn test_last_job_finalizes_closed_pool() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    let capture = completed(7, outputs_in(dir.path(), 7), &pool, 1);
    pool.release();
    assert!(!pool.is_finalized());

    SaveJob::new(
        capture,
        context(
            Arc::new(PassthroughEngine),
            Arc::new(PlainArtifactWriter),
            listener.clone(),
        ),
    )
    .run();

    assert!(pool.is_finalized());
    assert!(pool.get().is_closed());
    assert_eq!(*listener.events.lock(), vec![(Event::Saved(7), None)]);
}

#[test]
fn test_tiff_artifact_is_decodable() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);
    let outputs = OutputPaths {
        original: dir.path().join("RAW_test_8_ori_.tiff"),
        denoised: dir.path().join("RAW_test_8.tiff"),
    };

    let capture = completed(8, outputs.clone(), &pool, 1);
    let original = capture.buffer.samples();

    SaveJob::new(
        capture,
        context(
            Arc::new(PassthroughEngine),
            Arc::new(TiffArtifactWriter::new(TiffCompression::DeflateFast, Some(2))),
            listener.clone(),
        ),
    )
    .run();
    assert_eq!(listener.events(), vec![Event::Saved(8)]);

    let file = std::fs::File::open(&outputs.original).unwrap();
    let mut decoder = tiff::decoder::Decoder::new(file).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (WIDTH as u32, HEIGHT as u32));
    match decoder.read_image().unwrap() {
        tiff::decoder::DecodingResult::U16(samples) => assert_eq!(samples, original),
        _ => panic!("expected 16-bit samples"),
    }
}

#[test]
fn test_dispatcher_runs_every_job() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));
    let listener = RecordingListener::new(&pool);

    let dispatcher = SaveDispatcher::with_custom(
        RawTensorCodec::new(CodecConfig::default()).unwrap(),
        Arc::new(PassthroughEngine),
        Arc::new(PlainArtifactWriter),
        listener.clone(),
        3,
    )
    .unwrap();

    for id in 0..6 {
        dispatcher.dispatch(completed(id, outputs_in(dir.path(), id), &pool, 4));
    }
    dispatcher.wait_idle();

    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(pool.ref_count(), Some(0));
    let mut saved: Vec<CaptureRequestId> = listener
        .events()
        .into_iter()
        .map(|e| match e {
            Event::Saved(id) => id,
            Event::Failed(id, kind) => panic!("capture {id} failed with {kind:?}"),
        })
        .collect();
    saved.sort_unstable();
    assert_eq!(saved, (0..6).collect::<Vec<_>>());
    assert_eq!(dir_entries(dir.path()), 12);
}

#[test]
fn test_dispatcher_requires_workers() {
    let pool = ResourceGuard::new(BufferPool::new(10));
    let result = SaveDispatcher::with_custom(
        RawTensorCodec::new(CodecConfig::default()).unwrap(),
        Arc::new(PassthroughEngine),
        Arc::new(PlainArtifactWriter),
        RecordingListener::new(&pool),
        0,
    );
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

struct PanickingListener;

impl CaptureListener for PanickingListener {
    fn on_saved(&self, saved: &SavedCapture) {
        panic!("listener rejected capture {}", saved.id);
    }

    fn on_failed(&self, id: CaptureRequestId, _kind: FailureKind) {
        panic!("listener rejected failure of {id}");
    }
}

#[test]
fn test_listener_panic_leaves_workers_running() {
    let dir = TempDir::new().unwrap();
    let pool = ResourceGuard::new(BufferPool::new(10));

    let dispatcher = SaveDispatcher::with_custom(
        RawTensorCodec::new(CodecConfig::default()).unwrap(),
        Arc::new(PassthroughEngine),
        Arc::new(PlainArtifactWriter),
        Arc::new(PanickingListener),
        1,
    )
    .unwrap();

    dispatcher.dispatch(completed(0, outputs_in(dir.path(), 0), &pool, 1));
    dispatcher.dispatch(completed(1, outputs_in(dir.path(), 1), &pool, 1));
    dispatcher.wait_idle();

    // Failure notifications are guarded the same way
    SaveJob::new(
        completed(2, outputs_in(dir.path(), 2), &pool, 1),
        context(
            Arc::new(MockEngine { mode: EngineMode::Fail }),
            Arc::new(PlainArtifactWriter),
            Arc::new(PanickingListener),
        ),
    )
    .run();

    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(pool.ref_count(), Some(0));
    assert_eq!(dir_entries(dir.path()), 4);
}
