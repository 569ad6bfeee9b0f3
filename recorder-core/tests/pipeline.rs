use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use crossbeam_channel::{unbounded, Receiver};
use parking_lot::Mutex;

use recorder_core::processing::wav_format::{decode_pcm16, WavHeader};
use recorder_core::{
    BufferCallback, CaptureSource, ChannelBuffers, ExportCallback, ExportedAudio, FrameCallback,
    OfflineRenderer, Recorder, RecorderConfig, RecorderDelegate, RecorderError, RecorderStatus,
    RecordingState, RendererKind, Resampler,
};

const WAIT: Duration = Duration::from_secs(10);

fn export_channel() -> (ExportCallback, Receiver<Result<ExportedAudio, RecorderError>>) {
    let (tx, rx) = unbounded();
    let callback: ExportCallback = Arc::new(move |result: Result<ExportedAudio, RecorderError>| {
        tx.send(result).unwrap();
    });
    (callback, rx)
}

fn buffer_channel() -> (BufferCallback, Receiver<Result<ChannelBuffers, RecorderError>>) {
    let (tx, rx) = unbounded();
    let callback: BufferCallback = Arc::new(move |result: Result<ChannelBuffers, RecorderError>| {
        tx.send(result).unwrap();
    });
    (callback, rx)
}

/// Delivers `chunks` chunks of a ramp on its own thread, like an audio callback.
struct RampSource {
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
    chunks: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl RampSource {
    fn new(sample_rate: u32, channels: u16, chunk_frames: usize, chunks: usize) -> Self {
        Self {
            sample_rate,
            channels,
            chunk_frames,
            chunks,
            handle: None,
        }
    }

    fn sample(frame: usize, channel: usize) -> f32 {
        ((frame % 1000) as f32 / 1000.0) * if channel == 0 { 1.0 } else { -1.0 }
    }
}

impl CaptureSource for RampSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn frames_per_chunk(&self) -> Option<usize> {
        Some(self.chunk_frames)
    }

    fn start(&mut self, callback: FrameCallback) -> Result<(), RecorderError> {
        let (channels, frames, chunks) = (self.channels as usize, self.chunk_frames, self.chunks);
        self.handle = Some(thread::spawn(move || {
            for c in 0..chunks {
                let chunk = (0..channels)
                    .map(|ch| (0..frames).map(|i| Self::sample(c * frames + i, ch)).collect())
                    .collect();
                callback(chunk);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RecorderError::CaptureFailed("source thread panicked".into()))?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDelegate {
    states: Mutex<Vec<RecordingState>>,
    statuses: Mutex<Vec<RecorderStatus>>,
    errors: AtomicUsize,
}

impl RecorderDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: RecordingState) {
        self.states.lock().push(state);
    }

    fn on_status(&self, status: &RecorderStatus) {
        self.statuses.lock().push(*status);
    }

    fn on_error(&self, _error: &RecorderError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

struct BrokenRenderer;

impl OfflineRenderer for BrokenRenderer {
    fn render(&self, _: &[Vec<f32>], _: u32, _: u32, _: usize) -> Result<ChannelBuffers, RecorderError> {
        Err(RecorderError::RenderFailed("renderer crashed".into()))
    }
}

#[test]
fn mono_export_without_resampling() {
    let config = RecorderConfig::default()
        .with_channels(1)
        .with_native_sample_rate(8000)
        .with_sample_rate(8000);
    let recorder = Recorder::new(config).unwrap();

    recorder.record();
    recorder
        .on_frame_delivered(vec![vec![0.5, -0.5, 1.0, -1.0]])
        .unwrap();
    recorder.stop();

    let (callback, rx) = export_channel();
    recorder.export_wav(Some(callback), None).unwrap();
    let exported = rx.recv_timeout(WAIT).unwrap().unwrap();

    let header = WavHeader::parse(&exported.bytes).unwrap();
    assert_eq!(header.sample_rate, 8000);
    assert_eq!(header.channels, 1);
    assert_eq!(header.byte_rate, 16000);
    assert_eq!(header.data_size, 8);
    assert_eq!(exported.bytes.len(), 44 + 8);
    assert_eq!(decode_pcm16(&exported.bytes), vec![16383, -16384, 32767, -32768]);

    // Exactly one invocation.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn stereo_export_is_interleaved() {
    let config = RecorderConfig::default().with_native_sample_rate(44100);
    let recorder = Recorder::new(config).unwrap();

    recorder.record();
    recorder
        .on_frame_delivered(vec![vec![1.0, 0.0], vec![-1.0, 0.5]])
        .unwrap();

    let exported = recorder.export_wav_blocking(None, WAIT).unwrap();
    let header = WavHeader::parse(&exported.bytes).unwrap();
    assert_eq!(header.channels, 2);
    assert_eq!(header.block_align, 4);
    assert_eq!(header.byte_rate, 44100 * 4);
    assert_eq!(decode_pcm16(&exported.bytes), vec![32767, -32768, 0, 16383]);
}

#[test]
fn chunks_from_a_capture_thread_arrive_in_order() {
    let config = RecorderConfig::default()
        .with_channels(2)
        .with_native_sample_rate(48000)
        .with_sample_rate(48000)
        .with_frame_buffer_size(256);
    let recorder = Recorder::new(config).unwrap();
    let mut source = RampSource::new(48000, 2, 256, 40);

    recorder.record();
    recorder.attach(&mut source).unwrap();
    source.stop().unwrap();

    let (callback, rx) = buffer_channel();
    recorder.get_input_buffer(Some(callback)).unwrap();
    let buffers = rx.recv_timeout(WAIT).unwrap().unwrap();

    assert_eq!(buffers.len(), 2);
    for (channel, samples) in buffers.iter().enumerate() {
        assert_eq!(samples.len(), 256 * 40);
        for (frame, &sample) in samples.iter().enumerate() {
            assert_eq!(sample, RampSource::sample(frame, channel));
        }
    }
}

#[test]
fn attach_checks_the_source_format() {
    let recorder = Recorder::new(RecorderConfig::default()).unwrap();

    let mut wrong_rate = RampSource::new(48000, 2, 16, 1);
    assert!(matches!(
        recorder.attach(&mut wrong_rate),
        Err(RecorderError::ConfigurationFailed(_))
    ));

    let mut wrong_channels = RampSource::new(44100, 1, 16, 1);
    assert!(matches!(
        recorder.attach(&mut wrong_channels),
        Err(RecorderError::ChannelMismatch { expected: 2, actual: 1 })
    ));

    let mut wrong_chunk_size = RampSource::new(44100, 2, 512, 1);
    assert!(matches!(
        recorder.attach(&mut wrong_chunk_size),
        Err(RecorderError::ConfigurationFailed(_))
    ));

    let mut matching = RampSource::new(44100, 2, 4096, 1);
    recorder.attach(&mut matching).unwrap();
    matching.stop().unwrap();
}

#[test]
fn clear_empties_the_recording() {
    let recorder = Recorder::new(RecorderConfig::default().with_channels(1)).unwrap();
    recorder.record();
    recorder.on_frame_delivered(vec![vec![0.1; 64]]).unwrap();
    recorder.clear().unwrap();

    let (callback, rx) = buffer_channel();
    recorder.get_input_buffer(Some(callback.clone())).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap(), vec![Vec::<f32>::new()]);

    // Still capturing; new frames land in the cleared accumulator.
    recorder.on_frame_delivered(vec![vec![0.2; 8]]).unwrap();
    recorder.get_input_buffer(Some(callback)).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap(), vec![vec![0.2; 8]]);

    let exported = recorder.export_wav_blocking(None, WAIT).unwrap();
    assert_eq!(exported.bytes.len(), 44 + 16);
}

#[test]
fn back_to_back_exports_get_their_own_results() {
    let config = RecorderConfig::default()
        .with_channels(1)
        .with_native_sample_rate(48000)
        .with_sample_rate(16000)
        .with_renderer(RendererKind::Linear);
    let recorder = Recorder::new(config).unwrap();
    recorder.set_input_buffer(vec![vec![0.25; 4800]]).unwrap();

    let (tx, rx) = unbounded();
    let mut ids = Vec::new();
    for tag in ["audio/first", "audio/second", "audio/third"] {
        let tx = tx.clone();
        let callback: ExportCallback = Arc::new(move |result: Result<ExportedAudio, RecorderError>| {
            tx.send((tag, result.unwrap().mime_type)).unwrap();
        });
        ids.push(recorder.export_wav(Some(callback), Some(tag)).unwrap());
    }

    let mut results: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    results.sort();
    for (tag, mime_type) in results {
        assert_eq!(tag, mime_type);
    }
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn concurrent_buffer_requests_keep_their_callbacks() {
    let recorder = Recorder::new(RecorderConfig::default().with_channels(1)).unwrap();
    recorder.record();
    recorder.on_frame_delivered(vec![vec![0.5; 10]]).unwrap();

    let native_seen = Arc::new(AtomicBool::new(false));
    let resampled_seen = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = unbounded();

    let flag = Arc::clone(&native_seen);
    let tx = done_tx.clone();
    recorder
        .get_input_buffer(Some(Arc::new(move |result: Result<ChannelBuffers, RecorderError>| {
            assert_eq!(result.unwrap()[0].len(), 10);
            flag.store(true, Ordering::SeqCst);
            tx.send(()).unwrap();
        })))
        .unwrap();

    let flag = Arc::clone(&resampled_seen);
    recorder
        .get_buffer(Some(Arc::new(move |result: Result<ChannelBuffers, RecorderError>| {
            assert_eq!(result.unwrap()[0].len(), 10);
            flag.store(true, Ordering::SeqCst);
            done_tx.send(()).unwrap();
        })))
        .unwrap();

    done_rx.recv_timeout(WAIT).unwrap();
    done_rx.recv_timeout(WAIT).unwrap();
    assert!(native_seen.load(Ordering::SeqCst));
    assert!(resampled_seen.load(Ordering::SeqCst));
}

#[test]
fn render_failure_fails_the_export() {
    let config = RecorderConfig::default()
        .with_channels(1)
        .with_native_sample_rate(44100)
        .with_sample_rate(22050);
    let recorder = Recorder::with_resampler(config, Resampler::with_renderer(Arc::new(BrokenRenderer))).unwrap();
    recorder.set_input_buffer(vec![vec![0.0; 100]]).unwrap();

    let (callback, rx) = export_channel();
    recorder.export_wav(Some(callback), None).unwrap();
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(RecorderError::RenderFailed("renderer crashed".into()))
    );
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn fft_export_matches_expected_length() {
    let config = RecorderConfig::default()
        .with_channels(2)
        .with_native_sample_rate(44100)
        .with_sample_rate(16000)
        .with_renderer(RendererKind::Fft);
    let recorder = Recorder::new(config).unwrap();
    recorder.set_input_buffer(vec![vec![0.3; 44100], vec![-0.3; 44100]]).unwrap();

    let exported = recorder.export_wav_blocking(None, WAIT).unwrap();
    let header = WavHeader::parse(&exported.bytes).unwrap();
    assert_eq!(header.sample_rate, 16000);
    assert_eq!(header.data_size, 16000 * 2 * 2);
    assert_abs_diff_eq!(exported.duration_secs(), 1.0, epsilon = 1e-9);

    let pcm = decode_pcm16(&exported.bytes);
    let middle = 8000 * 2;
    assert_abs_diff_eq!(pcm[middle] as f32 / 32767.0, 0.3, epsilon = 0.02);
    assert_abs_diff_eq!(pcm[middle + 1] as f32 / 32768.0, -0.3, epsilon = 0.02);
}

#[test]
fn delegate_sees_state_changes_and_status() {
    let config = RecorderConfig::default()
        .with_channels(1)
        .with_native_sample_rate(1000);
    let recorder = Recorder::new(config).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    recorder.set_delegate(delegate.clone());

    recorder.record();
    recorder.record();
    recorder.on_frame_delivered(vec![vec![0.0; 250]]).unwrap();
    recorder.on_frame_delivered(vec![vec![0.0; 250]]).unwrap();
    recorder.stop();

    // A status round-trip after the deliveries guarantees the delegate's
    // status requests have been answered.
    let (tx, rx) = unbounded();
    recorder
        .get_status(Arc::new(move |status: Result<RecorderStatus, RecorderError>| {
            tx.send(status).unwrap();
        }))
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap().rec_length, 500);

    assert_eq!(
        *delegate.states.lock(),
        vec![RecordingState::Capturing, RecordingState::Idle]
    );
    let statuses = delegate.statuses.lock().clone();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].rec_length, 250);
    assert_abs_diff_eq!(statuses[1].duration_secs, 0.5);
    assert_eq!(delegate.errors.load(Ordering::SeqCst), 0);
}

#[test]
fn dropping_the_recorder_waits_for_pending_exports() {
    let config = RecorderConfig::default()
        .with_channels(1)
        .with_native_sample_rate(48000)
        .with_sample_rate(8000)
        .with_renderer(RendererKind::Linear);
    let recorder = Recorder::new(config).unwrap();
    recorder.set_input_buffer(vec![vec![0.0; 480]]).unwrap();

    let (callback, rx) = export_channel();
    recorder.export_wav(Some(callback), None).unwrap();
    drop(recorder);

    // Drop returned, so the callback has already fired.
    let exported = rx.try_recv().unwrap().unwrap();
    assert_eq!(exported.sample_rate, 8000);
    assert_eq!(decode_pcm16(&exported.bytes).len(), 80);
}

#[test]
fn invalid_configuration_is_rejected() {
    let err = Recorder::new(RecorderConfig::default().with_channels(0)).err();
    assert!(matches!(err, Some(RecorderError::ConfigurationFailed(_))));
}
