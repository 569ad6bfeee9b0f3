use std::time::Duration;

use thiserror::Error;

/// Errors raised by the recorder pipeline.
///
/// Failures are local to the call that produced them; nothing in the
/// pipeline retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("callback not set")]
    CallbackNotSet,

    #[error("expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{samples} interleaved samples do not divide into {channels} channels")]
    InterleavedLength { samples: usize, channels: usize },

    #[error("chunk is empty")]
    EmptyChunk,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("accumulator not initialized")]
    NotInitialized,

    #[error("processing worker unavailable")]
    WorkerUnavailable,

    #[error("no result within {0:?}")]
    Timeout(Duration),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}
