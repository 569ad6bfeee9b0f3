use crate::models::audio_models::ExportedAudio;
use crate::models::error::RecorderError;

/// Consumer of finished WAV blobs (a file on disk, an upload, ...).
pub trait ExportSink: Send + Sync {
    type Output;

    fn consume(&self, exported: &ExportedAudio) -> Result<Self::Output, RecorderError>;
}
