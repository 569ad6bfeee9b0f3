use std::sync::Arc;

use crate::models::audio_models::{ChannelBuffers, ExportedAudio, RecorderStatus};
use crate::models::error::RecorderError;

/// Receives materialized channel buffers from `get_buffer` / `get_input_buffer`.
///
/// Invoked exactly once per request, from a recorder-owned thread.
pub type BufferCallback =
    Arc<dyn Fn(Result<ChannelBuffers, RecorderError>) + Send + Sync + 'static>;

/// Receives the encoded WAV blob from `export_wav`.
///
/// Invoked exactly once per request, from a recorder-owned thread.
pub type ExportCallback =
    Arc<dyn Fn(Result<ExportedAudio, RecorderError>) + Send + Sync + 'static>;

/// Receives the accumulator status from `get_status`.
pub type StatusCallback =
    Arc<dyn Fn(Result<RecorderStatus, RecorderError>) + Send + Sync + 'static>;
