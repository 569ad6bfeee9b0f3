use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::{ChannelBuffers, ExportedAudio, RecorderStatus};
use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::models::state::RecordingState;
use crate::processing::accumulator::validate_chunk;
use crate::processing::resampler::{Resampled, Resampler};
use crate::session::protocol::{Command, RequestId, Response};
use crate::session::worker::RecorderWorker;
use crate::traits::callbacks::{BufferCallback, ExportCallback, StatusCallback};
use crate::traits::capture_source::{CaptureSource, FrameCallback};
use crate::traits::recorder_delegate::RecorderDelegate;

/// A request waiting for its response from the worker.
enum PendingRequest {
    Buffer {
        callback: BufferCallback,
        resample: bool,
    },
    Status {
        callback: StatusCallback,
    },
    /// Export that first needs the raw buffers for resampling.
    ExportGather {
        callback: ExportCallback,
        mime_type: String,
    },
    Export {
        callback: ExportCallback,
    },
    /// Status polled on behalf of the delegate after a forwarded chunk.
    DelegateStatus,
}

impl PendingRequest {
    /// Complete the request with `error`, whatever its kind.
    fn fail(self, error: RecorderError) {
        match self {
            Self::Buffer { callback, .. } => callback(Err(error)),
            Self::Status { callback } => callback(Err(error)),
            Self::ExportGather { callback, .. } | Self::Export { callback } => callback(Err(error)),
            Self::DelegateStatus => {}
        }
    }
}

/// Counts requests whose callback has not fired yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(self: &Arc<Self>) -> RequestGuard {
        *self.count.lock() += 1;
        RequestGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Marks one request as in flight until dropped.
///
/// Travels with the callback across the gather, resample and encode steps.
struct RequestGuard(Arc<InFlight>);

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

struct Tracked {
    request: PendingRequest,
    guard: RequestGuard,
}

/// State shared by the controller, capture handles, the dispatch thread
/// and in-flight resample threads.
struct Shared {
    config: RecorderConfig,
    recording: AtomicBool,
    commands: Sender<Command>,
    pending: Mutex<HashMap<RequestId, Tracked>>,
    in_flight: Arc<InFlight>,
    next_id: AtomicU64,
    resampler: Resampler,
    delegate: Mutex<Option<Arc<dyn RecorderDelegate>>>,
}

impl Shared {
    fn next_request_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn delegate(&self) -> Option<Arc<dyn RecorderDelegate>> {
        self.delegate.lock().clone()
    }

    fn send(&self, command: Command) -> Result<(), RecorderError> {
        self.commands
            .send(command)
            .map_err(|_| RecorderError::WorkerUnavailable)
    }

    /// Register a new request under `id`, then send `command`.
    fn send_tracked(&self, id: RequestId, pending: PendingRequest, command: Command) -> Result<(), RecorderError> {
        let guard = self.in_flight.begin();
        self.resend_tracked(id, pending, guard, command)
    }

    /// Register `pending` under `id`, then send `command`.
    ///
    /// Registration comes first so the response can never beat it. If the
    /// worker is gone the request is completed with `WorkerUnavailable`.
    fn resend_tracked(
        &self,
        id: RequestId,
        pending: PendingRequest,
        guard: RequestGuard,
        command: Command,
    ) -> Result<(), RecorderError> {
        self.pending.lock().insert(id, Tracked { request: pending, guard });
        if self.send(command).is_err() {
            let tracked = self.take_pending(id);
            if let Some(tracked) = tracked {
                tracked.request.fail(RecorderError::WorkerUnavailable);
            }
            return Err(RecorderError::WorkerUnavailable);
        }
        Ok(())
    }

    fn take_pending(&self, id: RequestId) -> Option<Tracked> {
        self.pending.lock().remove(&id)
    }

    fn set_recording(&self, recording: bool) {
        let was = self.recording.swap(recording, Ordering::SeqCst);
        if was == recording {
            return;
        }
        let state = if recording {
            RecordingState::Capturing
        } else {
            RecordingState::Idle
        };
        log::info!("recorder {:?}", state);
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }
}

/// Real-time side of a recorder: forwards captured chunks to the worker.
///
/// Cheap to clone and safe to move onto a capture thread. Never blocks.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    /// Forward one chunk per channel if the recorder is capturing.
    ///
    /// Chunks delivered while idle are dropped. Malformed chunks fail here,
    /// before they can skew the accumulator's frame count.
    pub fn deliver(&self, chunk: ChannelBuffers) -> Result<(), RecorderError> {
        if !self.shared.recording.load(Ordering::SeqCst) {
            log::trace!("idle, dropping chunk");
            return Ok(());
        }

        let frames = validate_chunk(&chunk, self.shared.config.channels as usize)?;
        if frames == 0 {
            return Err(RecorderError::EmptyChunk);
        }
        self.shared.send(Command::Record { chunk })?;

        if self.shared.delegate().is_some() {
            let id = self.shared.next_request_id();
            self.shared
                .send_tracked(id, PendingRequest::DelegateStatus, Command::GetStatus { id })?;
        }
        Ok(())
    }

    /// Split interleaved frames into one chunk per channel and forward them.
    pub fn deliver_interleaved(&self, samples: &[f32]) -> Result<(), RecorderError> {
        let channels = self.shared.config.channels as usize;
        if samples.len() % channels != 0 {
            return Err(RecorderError::InterleavedLength {
                samples: samples.len(),
                channels,
            });
        }

        let frames = samples.len() / channels;
        let mut chunk = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (channel, &sample) in chunk.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        self.deliver(chunk)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }
}

/// Capture controller.
///
/// Holds the configuration and recording state, and drives a processing
/// worker that owns the accumulated audio:
/// ```text
/// [CaptureSource] → [CaptureHandle] ─record→ [RecorderWorker: FrameAccumulator]
///                                                   │ getBuffer / exportWav
///      callback ← [dispatch] ← responses ───────────┘
///                     └→ [Resampler] → exportWav → [encode] → callback
/// ```
///
/// Every request gets its own [`RequestId`]; each callback fires exactly once.
pub struct Recorder {
    shared: Arc<Shared>,
    worker_handle: Option<thread::JoinHandle<()>>,
    dispatch_handle: Option<thread::JoinHandle<()>>,
}

impl Recorder {
    /// Validate `config`, start the worker and dispatch threads, and
    /// initialize the accumulator.
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        let resampler = Resampler::new(config.renderer);
        Self::with_resampler(config, resampler)
    }

    /// Like [`new`](Self::new), with an explicit resampler instead of the
    /// one `config.renderer` selects.
    pub fn with_resampler(config: RecorderConfig, resampler: Resampler) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;

        let (command_tx, command_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();

        let shared = Arc::new(Shared {
            resampler,
            recording: AtomicBool::new(false),
            commands: command_tx,
            pending: Mutex::new(HashMap::new()),
            in_flight: Arc::default(),
            next_id: AtomicU64::new(1),
            delegate: Mutex::new(None),
            config,
        });

        let worker_handle = RecorderWorker::spawn(command_rx, response_tx)?;
        shared.send(Command::Init {
            sample_rate: shared.config.native_sample_rate,
            channels: shared.config.channels as usize,
        })?;

        let dispatch_shared = Arc::clone(&shared);
        let dispatch_handle = thread::Builder::new()
            .name("recorder-dispatch".into())
            .spawn(move || dispatch_loop(dispatch_shared, response_rx))
            .map_err(|e| RecorderError::ConfigurationFailed(format!("failed to spawn dispatch thread: {}", e)))?;

        log::info!(
            "recorder ready: {} channels, {} Hz native, {} Hz output",
            shared.config.channels,
            shared.config.native_sample_rate,
            shared.config.sample_rate
        );

        Ok(Self {
            shared,
            worker_handle: Some(worker_handle),
            dispatch_handle: Some(dispatch_handle),
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RecorderDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.shared.config
    }

    pub fn state(&self) -> RecordingState {
        if self.shared.recording.load(Ordering::SeqCst) {
            RecordingState::Capturing
        } else {
            RecordingState::Idle
        }
    }

    /// Start accepting delivered frames. No-op if already capturing.
    pub fn record(&self) {
        self.shared.set_recording(true);
    }

    /// Stop accepting delivered frames. No-op if already idle.
    pub fn stop(&self) {
        self.shared.set_recording(false);
    }

    pub fn capture_handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A [`FrameCallback`] for capture sources. Rejected chunks are logged.
    pub fn frame_callback(&self) -> FrameCallback {
        let handle = self.capture_handle();
        Arc::new(move |chunk: ChannelBuffers| {
            if let Err(e) = handle.deliver(chunk) {
                log::error!("dropping captured chunk: {}", e);
            }
        })
    }

    /// Start `source`, wiring its frames into this recorder.
    ///
    /// The source must match the configured rate and channel count, and its
    /// chunk size (if fixed) must equal `frame_buffer_size`.
    pub fn attach<S: CaptureSource + ?Sized>(&self, source: &mut S) -> Result<(), RecorderError> {
        let config = &self.shared.config;
        if source.sample_rate() != config.native_sample_rate {
            return Err(RecorderError::ConfigurationFailed(format!(
                "source delivers {} Hz, recorder expects {} Hz",
                source.sample_rate(),
                config.native_sample_rate
            )));
        }
        if source.channels() != config.channels {
            return Err(RecorderError::ChannelMismatch {
                expected: config.channels as usize,
                actual: source.channels() as usize,
            });
        }
        if let Some(frames) = source.frames_per_chunk() {
            if frames != config.frame_buffer_size {
                return Err(RecorderError::ConfigurationFailed(format!(
                    "source delivers {} frames per chunk, recorder expects {}",
                    frames, config.frame_buffer_size
                )));
            }
        }
        log::debug!("attaching source: {} frames per chunk", config.frame_buffer_size);
        source.start(self.frame_callback())
    }

    /// Forward one delivered chunk (see [`CaptureHandle::deliver`]).
    pub fn on_frame_delivered(&self, chunk: ChannelBuffers) -> Result<(), RecorderError> {
        self.capture_handle().deliver(chunk)
    }

    /// Fetch the recording resampled to the output rate.
    ///
    /// Falls back to the configured callback; fails synchronously if neither
    /// is available.
    pub fn get_buffer(&self, callback: Option<BufferCallback>) -> Result<RequestId, RecorderError> {
        self.request_buffer(callback, true)
    }

    /// Fetch the recording at the native rate, skipping the resampler.
    pub fn get_input_buffer(&self, callback: Option<BufferCallback>) -> Result<RequestId, RecorderError> {
        self.request_buffer(callback, false)
    }

    fn request_buffer(&self, callback: Option<BufferCallback>, resample: bool) -> Result<RequestId, RecorderError> {
        let callback = callback
            .or_else(|| self.shared.config.callback.clone())
            .ok_or(RecorderError::CallbackNotSet)?;
        let id = self.shared.next_request_id();
        self.shared.send_tracked(
            id,
            PendingRequest::Buffer { callback, resample },
            Command::GetBuffer { id },
        )?;
        Ok(id)
    }

    /// Replace the accumulated recording with `buffers`.
    pub fn set_input_buffer(&self, buffers: ChannelBuffers) -> Result<(), RecorderError> {
        validate_chunk(&buffers, self.shared.config.channels as usize)?;
        self.shared.send(Command::SetBuffer { buffers })
    }

    /// Query the accumulated frame count.
    pub fn get_status(&self, callback: StatusCallback) -> Result<RequestId, RecorderError> {
        let id = self.shared.next_request_id();
        self.shared
            .send_tracked(id, PendingRequest::Status { callback }, Command::GetStatus { id })?;
        Ok(id)
    }

    /// Encode the recording as WAV at the output rate.
    ///
    /// With matching rates the worker encodes its own buffers directly;
    /// otherwise the buffers go through the resampler first. `mime_type`
    /// defaults to the configured one.
    pub fn export_wav(
        &self,
        callback: Option<ExportCallback>,
        mime_type: Option<&str>,
    ) -> Result<RequestId, RecorderError> {
        let config = &self.shared.config;
        let callback = callback
            .or_else(|| config.export_callback.clone())
            .ok_or(RecorderError::CallbackNotSet)?;
        let mime_type = mime_type.unwrap_or(&config.mime_type).to_string();
        let id = self.shared.next_request_id();

        if config.needs_resampling() {
            self.shared.send_tracked(
                id,
                PendingRequest::ExportGather { callback, mime_type },
                Command::GetBuffer { id },
            )?;
        } else {
            self.shared.send_tracked(
                id,
                PendingRequest::Export { callback },
                Command::ExportWav {
                    id,
                    mime_type,
                    sample_rate: None,
                    buffers: None,
                },
            )?;
        }
        Ok(id)
    }

    /// Export and wait for the result.
    ///
    /// Must not be called from inside a recorder callback.
    pub fn export_wav_blocking(
        &self,
        mime_type: Option<&str>,
        timeout: Duration,
    ) -> Result<ExportedAudio, RecorderError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.export_wav(
            Some(Arc::new(move |result: Result<ExportedAudio, RecorderError>| {
                let _ = tx.try_send(result);
            })),
            mime_type,
        )?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => RecorderError::Timeout(timeout),
            RecvTimeoutError::Disconnected => RecorderError::WorkerUnavailable,
        })?
    }

    /// Drop everything recorded so far. Allowed in any state.
    pub fn clear(&self) -> Result<(), RecorderError> {
        self.shared.send(Command::Clear)
    }
}

/// Stops capturing, waits for every outstanding request to complete, then
/// shuts the worker down. Must not run inside a recorder callback.
impl Drop for Recorder {
    fn drop(&mut self) {
        self.shared.set_recording(false);
        self.shared.in_flight.wait_idle();
        let _ = self.shared.send(Command::Shutdown);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatch_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Run a user callback, containing any panic so the calling thread survives.
///
/// Whatever the callback owned (including its in-flight guard) is dropped
/// during unwinding.
fn shielded(what: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!("{} panicked; continuing", what);
    }
}

/// Route worker responses to their pending requests until the worker exits.
fn dispatch_loop(shared: Arc<Shared>, responses: Receiver<Response>) {
    for response in responses.iter() {
        shielded("response callback", || dispatch(&shared, response));
    }

    let orphaned: Vec<_> = shared.pending.lock().drain().collect();
    if !orphaned.is_empty() {
        log::warn!("worker stopped with {} requests in flight", orphaned.len());
    }
    for (_, tracked) in orphaned {
        shielded("failed request callback", || tracked.request.fail(RecorderError::WorkerUnavailable));
    }
}

fn dispatch(shared: &Arc<Shared>, response: Response) {
    let id = match &response {
        Response::Rejected { command, error } => {
            log::error!("worker rejected {}: {}", command, error);
            if let Some(delegate) = shared.delegate() {
                delegate.on_error(error);
            }
            return;
        }
        other => other.request_id(),
    };
    let Some(id) = id else { return };
    let Some(Tracked { request, guard }) = shared.take_pending(id) else {
        log::warn!("no pending request for response {}", id);
        return;
    };

    match (request, response) {
        (PendingRequest::Buffer { callback, resample: false }, Response::GetBuffer { buffers, .. }) => {
            callback(buffers);
        }
        (PendingRequest::Buffer { callback, resample: true }, Response::GetBuffer { buffers, .. }) => {
            let buffers = match buffers {
                Ok(buffers) => buffers,
                Err(e) => return callback(Err(e)),
            };
            let config = &shared.config;
            let on_done = Arc::clone(&callback);
            let spawned = shared.resampler.spawn(
                buffers,
                config.native_sample_rate,
                config.sample_rate,
                move |result| {
                    on_done(result.map(|r| r.buffers));
                    drop(guard);
                },
            );
            if let Err(e) = spawned {
                callback(Err(e));
            }
        }
        (PendingRequest::ExportGather { callback, mime_type }, Response::GetBuffer { buffers, .. }) => {
            let buffers = match buffers {
                Ok(buffers) => buffers,
                Err(e) => return callback(Err(e)),
            };
            let config = &shared.config;
            let continuation = Arc::clone(shared);
            let on_done = Arc::clone(&callback);
            let spawned = shared.resampler.spawn(
                buffers,
                config.native_sample_rate,
                config.sample_rate,
                move |result| continue_export(&continuation, id, on_done, guard, mime_type, result),
            );
            if let Err(e) = spawned {
                callback(Err(e));
            }
        }
        (PendingRequest::Export { callback }, Response::ExportWav { exported, .. }) => {
            callback(exported);
        }
        (PendingRequest::Status { callback }, Response::GetStatus { rec_length, .. }) => {
            callback(rec_length.map(|n| RecorderStatus::new(n, shared.config.native_sample_rate)));
        }
        (PendingRequest::DelegateStatus, Response::GetStatus { rec_length, .. }) => {
            if let (Ok(n), Some(delegate)) = (rec_length, shared.delegate()) {
                delegate.on_status(&RecorderStatus::new(n, shared.config.native_sample_rate));
            }
        }
        (pending, response) => {
            log::error!("response {:?} does not match request {}", response, id);
            pending.fail(RecorderError::WorkerUnavailable);
        }
    }
}

/// Hand resampled buffers back to the worker for encoding under the same id.
fn continue_export(
    shared: &Shared,
    id: RequestId,
    callback: ExportCallback,
    guard: RequestGuard,
    mime_type: String,
    resampled: Result<Resampled, RecorderError>,
) {
    let resampled = match resampled {
        Ok(resampled) => resampled,
        Err(e) => {
            log::error!("export {} failed: {}", id, e);
            return callback(Err(e));
        }
    };
    // On failure send_tracked has already completed the callback.
    let _ = shared.resend_tracked(
        id,
        PendingRequest::Export { callback },
        guard,
        Command::ExportWav {
            id,
            mime_type,
            sample_rate: Some(resampled.sample_rate),
            buffers: Some(resampled.buffers),
        },
    );
}
