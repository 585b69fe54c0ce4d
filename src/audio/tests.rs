use super::engine::TriggerMachine;
use super::source::{ChunkDispatcher, DropReporter};
use super::{
    negotiate_sample_rate, read_wav_header, resolve_device, AudioBackend, AudioFormat, DeviceInfo,
    Frame, FrameSource, RecorderConfig, RecordingEngine, SampleRate, TriggerEvent, TriggerState,
    DEFAULT_DEVICE_MARKER,
};
use crate::error::{RecorderError, Result};
use crossbeam_channel::bounded;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CHUNK: usize = 1024;
const RATE: SampleRate = 8_000;
/// Quiet frames needed to cover one second of silence at 8 kHz / 1024.
const FRAMES_PER_SECOND_OF_SILENCE: usize = 8;

fn frame_with(level: i16) -> Frame {
    let samples: Vec<i16> = (0..CHUNK * 2)
        .map(|i| if i % 2 == 0 { level } else { -level })
        .collect();
    Frame::from_samples(&samples)
}

fn loud() -> Frame {
    frame_with(3_000)
}

fn quiet() -> Frame {
    frame_with(100)
}

fn device(index: usize, name: &str, channels: u16) -> DeviceInfo {
    DeviceInfo {
        index,
        name: name.to_string(),
        max_input_channels: channels,
    }
}

/// Source that hands out scripted frames, then repeats `endless` if set.
struct MockSource {
    frames: VecDeque<Frame>,
    endless: Option<Frame>,
    drained: Option<Arc<AtomicBool>>,
    closes: Arc<AtomicUsize>,
    close_limit: Option<(usize, Arc<AtomicBool>)>,
    closed: bool,
}

impl FrameSource for MockSource {
    fn read(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(RecorderError::StreamClosed);
        }
        if let Some(frame) = self.frames.pop_front() {
            if self.frames.is_empty() && self.endless.is_none() {
                if let Some(flag) = &self.drained {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            return Ok(frame);
        }
        self.endless.clone().ok_or(RecorderError::StreamClosed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let closes = self.closes.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((limit, flag)) = &self.close_limit {
            if closes >= *limit {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }
}

struct MockBackend {
    devices: Vec<DeviceInfo>,
    rates: Vec<SampleRate>,
    script: Mutex<VecDeque<Frame>>,
    endless: Option<Frame>,
    drained: Option<Arc<AtomicBool>>,
    close_limit: Option<(usize, Arc<AtomicBool>)>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            devices: vec![device(0, "USB Audio CODEC: PCM", 2)],
            rates: vec![RATE],
            script: Mutex::new(VecDeque::new()),
            endless: None,
            drained: None,
            close_limit: None,
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    fn with_rates(mut self, rates: &[SampleRate]) -> Self {
        self.rates = rates.to_vec();
        self
    }

    /// Every opened stream repeats `frame` forever.
    fn endless(mut self, frame: Frame) -> Self {
        self.endless = Some(frame);
        self
    }

    /// The single stream plays `frames` then raises `stop` after the last one.
    fn scripted(mut self, frames: Vec<Frame>, stop: Arc<AtomicBool>) -> Self {
        self.script = Mutex::new(frames.into());
        self.drained = Some(stop);
        self
    }

    /// Raise `stop` once `limit` streams have been closed.
    fn stop_after_closes(mut self, limit: usize, stop: Arc<AtomicBool>) -> Self {
        self.close_limit = Some((limit, stop));
        self
    }
}

impl AudioBackend for MockBackend {
    type Source = MockSource;

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn supports_input(&self, _device: usize, channels: u16, sample_rate: SampleRate) -> bool {
        channels == 2 && self.rates.contains(&sample_rate)
    }

    fn open(&self, _device: usize, _format: &AudioFormat) -> Result<Self::Source> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let frames = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(MockSource {
            frames,
            endless: self.endless.clone(),
            drained: self.drained.clone(),
            closes: self.closes.clone(),
            close_limit: self.close_limit.clone(),
            closed: false,
        })
    }
}

fn triggered_config(dir: &Path) -> RecorderConfig {
    RecorderConfig::new()
        .with_output_dir(dir)
        .with_chunk_size(CHUNK)
        .triggered(1500.0, 1)
}

fn looped_config(dir: &Path, duration_secs: u64, repeat: bool) -> RecorderConfig {
    RecorderConfig::new()
        .with_output_dir(dir)
        .with_chunk_size(CHUNK)
        .looped(duration_secs, repeat)
}

fn run_triggered(frames: Vec<Frame>) -> (tempfile::TempDir, super::RecordSummary) {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = Arc::new(AtomicBool::new(false));
    let backend = MockBackend::new().scripted(frames, stop.clone());
    let mut engine = RecordingEngine::new(backend, triggered_config(dir.path()))
        .expect("engine")
        .with_stop_flag(stop);
    let summary = engine.record().expect("record");
    (dir, summary)
}

fn frames_in(path: &Path) -> u32 {
    read_wav_header(path).expect("wav header").frames / CHUNK as u32
}

#[test]
fn explicit_device_index_is_trusted() {
    let backend = MockBackend::new().with_devices(Vec::new());
    assert_eq!(resolve_device(&backend, Some(7), DEFAULT_DEVICE_MARKER).unwrap(), 7);
}

#[test]
fn no_input_devices_is_an_error() {
    let backend = MockBackend::new().with_devices(vec![device(0, "HDMI Output", 0)]);
    let err = resolve_device(&backend, None, DEFAULT_DEVICE_MARKER).expect_err("no inputs");
    assert!(matches!(err, RecorderError::NoInputDevice));
}

#[test]
fn marker_device_wins_over_earlier_inputs() {
    let backend = MockBackend::new().with_devices(vec![
        device(0, "HDA Intel PCH: ALC3246 Analog", 2),
        device(1, "HDMI Output", 0),
        device(2, "USB Audio CODEC: USB Audio (hw:2,0)", 2),
    ]);
    assert_eq!(resolve_device(&backend, None, DEFAULT_DEVICE_MARKER).unwrap(), 2);
}

#[test]
fn marker_match_is_case_sensitive_and_skips_outputs() {
    let backend = MockBackend::new().with_devices(vec![
        device(0, "USB Audio CODEC (output only)", 0),
        device(1, "usb audio codec", 1),
        device(2, "Webcam Mic", 1),
    ]);
    assert_eq!(resolve_device(&backend, None, DEFAULT_DEVICE_MARKER).unwrap(), 1);
}

#[test]
fn negotiation_prefers_highest_supported_rate() {
    let backend = MockBackend::new().with_rates(&[8_000, 44_100, 16_000]);
    assert_eq!(negotiate_sample_rate(&backend, 0).unwrap(), 44_100);

    let backend = MockBackend::new().with_rates(&[48_000, 8_000]);
    assert_eq!(negotiate_sample_rate(&backend, 0).unwrap(), 48_000);
}

#[test]
fn negotiation_fails_without_candidate_rate() {
    let backend = MockBackend::new().with_rates(&[22_050, 96_000]);
    let err = negotiate_sample_rate(&backend, 3).expect_err("no candidate");
    assert!(matches!(err, RecorderError::UnsupportedFormat { device: 3 }));
}

#[test]
fn startup_failure_never_opens_a_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = MockBackend::new().with_rates(&[]);
    let opens = backend.opens.clone();
    let result = RecordingEngine::new(backend, looped_config(dir.path(), 1, false));
    assert!(matches!(result, Err(RecorderError::UnsupportedFormat { .. })));
    assert_eq!(opens.load(Ordering::Relaxed), 0);
}

#[test]
fn engine_creates_output_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("nested").join("recordings");
    let engine = RecordingEngine::new(MockBackend::new(), looped_config(&out, 1, false))
        .expect("engine");
    assert!(out.is_dir());
    assert_eq!(engine.format(), AudioFormat::new(RATE, CHUNK));
}

#[test]
fn single_loop_writes_one_rounded_up_segment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = MockBackend::new().endless(quiet());
    let opens = backend.opens.clone();
    let closes = backend.closes.clone();
    let mut engine =
        RecordingEngine::new(backend, looped_config(dir.path(), 1, false)).expect("engine");

    let summary = engine.record().expect("record");

    // 8000 / 1024 * 1 = 7.8125 chunks, rounded up.
    assert_eq!(summary.segments_written(), 1);
    assert_eq!(summary.frames_written, 8);
    assert!(!summary.interrupted);
    assert_eq!(opens.load(Ordering::Relaxed), 1);
    assert_eq!(closes.load(Ordering::Relaxed), 1);

    let header = read_wav_header(&summary.written[0]).expect("header");
    assert_eq!(header.channels, 2);
    assert_eq!(header.sample_rate, RATE);
    assert_eq!(header.bits_per_sample, 16);
    assert_eq!(header.total_samples, (8 * CHUNK * 2) as u32);
}

#[test]
fn repeating_loop_writes_one_segment_per_iteration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = Arc::new(AtomicBool::new(false));
    let backend = MockBackend::new()
        .endless(loud())
        .stop_after_closes(3, stop.clone());
    let opens = backend.opens.clone();
    let mut engine = RecordingEngine::new(backend, looped_config(dir.path(), 2, true))
        .expect("engine")
        .with_stop_flag(stop);

    let summary = engine.record().expect("record");

    assert_eq!(summary.segments_written(), 3);
    assert!(summary.interrupted);
    assert_eq!(opens.load(Ordering::Relaxed), 3);
    for path in &summary.written {
        assert_eq!(frames_in(path), 16);
    }
    let mut names: Vec<_> = summary.written.iter().collect();
    names.dedup();
    assert_eq!(names.len(), 3);
}

#[test]
fn write_failure_does_not_stop_repeating_loop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let stop = Arc::new(AtomicBool::new(false));
    let backend = MockBackend::new()
        .endless(quiet())
        .stop_after_closes(2, stop.clone());
    let mut engine = RecordingEngine::new(backend, looped_config(&out, 1, true))
        .expect("engine")
        .with_stop_flag(stop);
    std::fs::remove_dir_all(&out).expect("remove output dir");

    let summary = engine.record().expect("record");

    assert_eq!(summary.segments_written(), 0);
    assert_eq!(summary.segments_failed, 2);
}

#[test]
fn interrupt_before_first_loop_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = Arc::new(AtomicBool::new(true));
    let backend = MockBackend::new().endless(quiet());
    let opens = backend.opens.clone();
    let mut engine = RecordingEngine::new(backend, looped_config(dir.path(), 1, true))
        .expect("engine")
        .with_stop_flag(stop);

    let summary = engine.record().expect("record");
    assert!(summary.interrupted);
    assert!(summary.written.is_empty());
    assert_eq!(opens.load(Ordering::Relaxed), 0);
}

#[test]
fn interrupt_mid_segment_flushes_partial_segment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = Arc::new(AtomicBool::new(false));
    let backend = MockBackend::new().scripted(vec![quiet(); 3], stop.clone());
    let mut engine = RecordingEngine::new(backend, looped_config(dir.path(), 1, true))
        .expect("engine")
        .with_stop_flag(stop);

    let summary = engine.record().expect("record");

    // The segment wanted 8 chunks; the stop landed after 3.
    assert!(summary.interrupted);
    assert_eq!(summary.segments_written(), 1);
    assert_eq!(summary.frames_written, 3);
    assert_eq!(frames_in(&summary.written[0]), 3);
}

#[test]
fn stream_failure_mid_segment_keeps_partial_audio() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop = Arc::new(AtomicBool::new(false));
    let backend = MockBackend::new().scripted(vec![quiet(), quiet(), quiet()], stop);
    let mut engine =
        RecordingEngine::new(backend, looped_config(dir.path(), 1, false)).expect("engine");

    let err = engine.record().expect_err("stream ran dry");
    assert!(matches!(err, RecorderError::StreamClosed));
    let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[test]
fn quiet_input_never_triggers() {
    let (dir, summary) = run_triggered(vec![quiet(); 40]);
    assert!(summary.written.is_empty());
    assert!(summary.interrupted);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn silence_timeout_closes_clip_including_trailing_silence() {
    let mut frames = vec![quiet(), quiet(), loud()];
    frames.extend(std::iter::repeat(quiet()).take(FRAMES_PER_SECOND_OF_SILENCE + 5));
    let (_dir, summary) = run_triggered(frames);

    assert_eq!(summary.segments_written(), 1);
    // Trigger frame plus the full silence window.
    assert_eq!(frames_in(&summary.written[0]), 1 + FRAMES_PER_SECOND_OF_SILENCE as u32);
    assert_eq!(summary.frames_written, 1 + FRAMES_PER_SECOND_OF_SILENCE);
}

#[test]
fn oscillating_input_stays_one_clip() {
    let mut frames = Vec::new();
    for _ in 0..6 {
        frames.push(loud());
        frames.extend(std::iter::repeat(quiet()).take(FRAMES_PER_SECOND_OF_SILENCE - 1));
    }
    let total = frames.len();
    let (_dir, summary) = run_triggered(frames);

    assert_eq!(summary.segments_written(), 1);
    assert_eq!(summary.frames_written, total);
    assert!(summary.interrupted);
}

#[test]
fn separate_bursts_make_separate_clips() {
    let mut frames = vec![loud(), loud()];
    frames.extend(std::iter::repeat(quiet()).take(FRAMES_PER_SECOND_OF_SILENCE));
    frames.extend(std::iter::repeat(quiet()).take(4));
    frames.push(loud());
    frames.extend(std::iter::repeat(quiet()).take(FRAMES_PER_SECOND_OF_SILENCE));
    let (_dir, summary) = run_triggered(frames);

    assert_eq!(summary.segments_written(), 2);
    assert_ne!(summary.written[0], summary.written[1]);
    assert_eq!(frames_in(&summary.written[0]), 2 + FRAMES_PER_SECOND_OF_SILENCE as u32);
    assert_eq!(frames_in(&summary.written[1]), 1 + FRAMES_PER_SECOND_OF_SILENCE as u32);
}

#[test]
fn interrupt_while_recording_flushes_partial_clip() {
    let (_dir, summary) = run_triggered(vec![quiet(), loud(), loud(), quiet()]);
    assert!(summary.interrupted);
    assert_eq!(summary.segments_written(), 1);
    assert_eq!(frames_in(&summary.written[0]), 3);
}

#[test]
fn interrupt_while_idle_after_clip_writes_nothing_more() {
    let mut frames = vec![loud()];
    frames.extend(std::iter::repeat(quiet()).take(FRAMES_PER_SECOND_OF_SILENCE + 3));
    let (_dir, summary) = run_triggered(frames);
    assert_eq!(summary.segments_written(), 1);
}

#[test]
fn trigger_machine_threshold_is_strict() {
    let format = AudioFormat::new(RATE, CHUNK);
    let mut machine = TriggerMachine::new(1_000.0, 1, &format);
    assert_eq!(machine.push(frame_with(1_000)), None);
    assert_eq!(machine.state(), TriggerState::Idle);
    assert_eq!(machine.buffered_frames(), 0);

    assert_eq!(machine.push(frame_with(1_001)), Some(TriggerEvent::Started));
    assert_eq!(machine.state(), TriggerState::Recording);
}

#[test]
fn trigger_machine_resets_silence_on_loud_frame() {
    let format = AudioFormat::new(RATE, CHUNK);
    let mut machine = TriggerMachine::new(1_500.0, 1, &format);
    machine.push(loud());
    machine.push(quiet());
    machine.push(quiet());
    assert!((machine.silence_secs() - 2.0 * format.chunk_seconds()).abs() < 1e-9);
    machine.push(loud());
    assert_eq!(machine.silence_secs(), 0.0);
    assert_eq!(machine.buffered_frames(), 4);
}

#[test]
fn trigger_machine_finish_returns_open_clip_once() {
    let format = AudioFormat::new(RATE, CHUNK);
    let mut machine = TriggerMachine::new(1_500.0, 1, &format);
    assert!(machine.finish().is_none());
    machine.push(loud());
    assert_eq!(machine.finish().map(|frames| frames.len()), Some(1));
    assert!(machine.finish().is_none());
    assert_eq!(machine.state(), TriggerState::Idle);
}

#[test]
fn chunks_for_rounds_up() {
    assert_eq!(AudioFormat::new(48_000, 1024).chunks_for(300), 14_063);
    assert_eq!(AudioFormat::new(16_000, 1000).chunks_for(2), 32);
    assert_eq!(AudioFormat::new(8_000, 1024).chunks_for(0), 0);
}

#[test]
fn chunks_for_saturates_on_huge_durations() {
    let format = AudioFormat::new(48_000, 1);
    assert_eq!(format.chunks_for(u64::MAX), usize::try_from(u64::MAX).unwrap_or(usize::MAX));
}

#[test]
fn frame_size_matches_format() {
    let format = AudioFormat::new(44_100, 1024);
    assert_eq!(format.frame_bytes(), 4096);
    assert_eq!(loud().len(), AudioFormat::new(RATE, CHUNK).frame_bytes());
}

#[test]
fn chunk_dispatcher_emits_chunks_and_tracks_drops() {
    let (tx, rx) = bounded::<Vec<i16>>(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = ChunkDispatcher::new(2, tx, dropped.clone());

    dispatcher.push(&[1, 2, 3, 4]);

    let chunk = rx.try_recv().expect("missing chunk");
    assert_eq!(chunk, vec![1, 2]);
    assert_eq!(dropped.load(Ordering::Relaxed), 1);
}

#[test]
fn chunk_dispatcher_accumulates_partial_chunks() {
    let (tx, rx) = bounded::<Vec<i16>>(4);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = ChunkDispatcher::new(3, tx, dropped);

    dispatcher.push(&[1, 2]);
    assert!(rx.try_recv().is_err());

    dispatcher.push(&[3, 4]);
    assert_eq!(rx.try_recv().expect("missing chunk"), vec![1, 2, 3]);
    assert!(rx.try_recv().is_err());
}

#[test]
fn drop_reporter_warns_on_first_drop_then_every_interval() {
    let mut reporter = DropReporter::default();
    assert_eq!(reporter.observe(0), None);
    assert_eq!(reporter.observe(1), Some(1));
    assert_eq!(reporter.observe(1), None);
    assert_eq!(reporter.observe(100), None);
    assert_eq!(reporter.observe(101), Some(101));
    assert_eq!(reporter.observe(150), None);
    assert_eq!(reporter.observe(250), Some(250));
}
