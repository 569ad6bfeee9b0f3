use serde::{Deserialize, Serialize};

use super::audio_models::ExportedAudio;

/// Metadata written alongside an exported recording.
///
/// Serializable for the JSON sidecar produced by
/// [`FileSink`](crate::storage::file_sink::FileSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_path: String,
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
    pub byte_length: u64,
    pub checksum: String,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn new(exported: &ExportedAudio, file_path: &str, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: file_path.to_string(),
            mime_type: exported.mime_type.clone(),
            sample_rate: exported.sample_rate,
            channels: exported.channels,
            duration_secs: exported.duration_secs(),
            byte_length: exported.bytes.len() as u64,
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
