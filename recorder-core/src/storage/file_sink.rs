use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::ExportedAudio;
use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingMetadata;
use crate::processing::wav_format::WavHeader;
use crate::storage::metadata;
use crate::traits::export_sink::ExportSink;

/// File name used when none is given.
pub const DEFAULT_FILE_NAME: &str = "output.wav";

/// Writes exported WAV blobs to disk with a JSON metadata sidecar.
///
/// ```text
/// {directory}/{file_name}
/// {directory}/{file_stem}.metadata.json
/// ```
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    file_name: String,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_name: DEFAULT_FILE_NAME.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Full path of the recording this sink writes.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Write `exported` and its sidecar, returning the metadata.
    pub fn write(&self, exported: &ExportedAudio) -> Result<RecordingMetadata, RecorderError> {
        // Refuse to persist anything that is not a well-formed WAV blob.
        WavHeader::parse(&exported.bytes)?;

        fs::create_dir_all(&self.directory)
            .map_err(|e| RecorderError::StorageError(format!("failed to create directory: {}", e)))?;

        let path = self.file_path();
        fs::write(&path, &exported.bytes)
            .map_err(|e| RecorderError::StorageError(format!("failed to write {}: {}", path.display(), e)))?;

        let checksum = sha256_hex(&exported.bytes);
        let metadata = RecordingMetadata::new(exported, &path.to_string_lossy(), &checksum);
        metadata::write_metadata(&metadata, &path)?;

        log::info!(
            "wrote {} ({} bytes, {:.2}s)",
            path.display(),
            exported.bytes.len(),
            metadata.duration_secs
        );
        Ok(metadata)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ExportSink for FileSink {
    type Output = RecordingMetadata;

    fn consume(&self, exported: &ExportedAudio) -> Result<RecordingMetadata, RecorderError> {
        self.write(exported)
    }
}

/// SHA-256 hex digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{:02x}", b)).collect()
}
