use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use recorder_core::{CaptureSource, FrameCallback, RecorderError};

/// Synthesized sine tone delivered in real time from its own thread.
///
/// Channel `n` is the tone scaled by `1 / (n + 1)` so channels are
/// distinguishable in the output.
pub struct ToneSource {
    sample_rate: u32,
    channels: u16,
    frames: usize,
    frequency: f32,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ToneSource {
    /// A tone delivered in chunks of `frames` frames.
    pub fn new(sample_rate: u32, channels: u16, frames: usize, frequency: f32) -> Self {
        Self {
            sample_rate,
            channels,
            frames,
            frequency,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }
}

impl CaptureSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn frames_per_chunk(&self) -> Option<usize> {
        Some(self.frames)
    }

    fn start(&mut self, callback: FrameCallback) -> Result<(), RecorderError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecorderError::CaptureFailed("tone already running".into()));
        }
        if self.sample_rate == 0 || self.frames == 0 {
            return Err(RecorderError::ConfigurationFailed(
                "tone sample rate and chunk size must be positive".into(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let (rate, channels, frames, frequency) =
            (self.sample_rate, self.channels as usize, self.frames, self.frequency);

        let handle = thread::Builder::new()
            .name("tone-capture".into())
            .spawn(move || {
                tone_loop(&running, rate, channels, frames, frequency, callback);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| RecorderError::CaptureFailed(format!("failed to spawn tone thread: {}", e)))?;

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            handle
                .join()
                .map_err(|_| RecorderError::CaptureFailed("tone thread panicked".into()))?;
        }
        Ok(())
    }
}

/// Emit one chunk per chunk period until `running` clears.
fn tone_loop(
    running: &AtomicBool,
    rate: u32,
    channels: usize,
    frames: usize,
    frequency: f32,
    callback: FrameCallback,
) {
    let period = Duration::from_secs_f64(frames as f64 / rate as f64);
    let ticker = crossbeam_channel::tick(period);
    let step = TAU * frequency / rate as f32;
    let mut phase = 0.0f32;

    log::debug!("tone: {} Hz, {} channels at {} Hz, chunk every {:?}", frequency, channels, rate, period);

    while running.load(Ordering::SeqCst) {
        if ticker.recv().is_err() {
            break;
        }

        let mut tone = Vec::with_capacity(frames);
        for _ in 0..frames {
            tone.push(0.8 * phase.sin());
            phase = (phase + step) % TAU;
        }

        let chunk = (0..channels)
            .map(|ch| tone.iter().map(|s| s / (ch + 1) as f32).collect())
            .collect();
        callback(chunk);
    }
}
