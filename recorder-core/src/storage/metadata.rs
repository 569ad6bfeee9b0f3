use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar location for a recording: `take.wav` → `take.metadata.json`.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> RecorderError {
    RecorderError::StorageError(format!("failed to {} {}: {}", action, path.display(), e))
}

/// Write `metadata` as pretty JSON next to the recording.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let path = sidecar_path(recording_path);
    let file = File::create(&path).map_err(|e| storage_error("create", &path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, metadata).map_err(|e| storage_error("serialize", &path, e))?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| storage_error("write", &path, e))
}

/// Load the sidecar written by [`write_metadata`] for `recording_path`.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, RecorderError> {
    let path = sidecar_path(recording_path);
    let file = File::open(&path).map_err(|e| storage_error("open", &path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| storage_error("parse", &path, e))
}
