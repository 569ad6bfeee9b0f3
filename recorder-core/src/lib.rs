//! # recorder-core
//!
//! Capture-to-WAV pipeline for multichannel float audio.
//!
//! Frames delivered by a capture source are accumulated losslessly and in
//! order on a processing worker, optionally resampled to a target rate, and
//! encoded as a 44-byte-header RIFF/WAV PCM16 blob.
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← CaptureSource, RecorderDelegate, ExportSink, callback types
//! ├── models/       ← RecorderError, RecordingState, RecorderConfig, ExportedAudio, etc.
//! ├── processing/   ← FrameAccumulator, Resampler + offline renderers, WAV encoding
//! ├── session/      ← Recorder (controller), RecorderWorker, command protocol
//! └── storage/      ← FileSink, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{ChannelBuffers, ExportedAudio, RecorderStatus};
pub use models::config::RecorderConfig;
pub use models::error::RecorderError;
pub use models::recording_result::RecordingMetadata;
pub use models::state::RecordingState;
pub use processing::accumulator::FrameAccumulator;
pub use processing::resampler::{FftRenderer, LinearRenderer, OfflineRenderer, RendererKind, Resampled, Resampler};
pub use session::protocol::RequestId;
pub use session::recorder::{CaptureHandle, Recorder};
pub use storage::file_sink::FileSink;
pub use traits::callbacks::{BufferCallback, ExportCallback, StatusCallback};
pub use traits::capture_source::{CaptureSource, FrameCallback};
pub use traits::export_sink::ExportSink;
pub use traits::recorder_delegate::RecorderDelegate;
