//! Atomic file operations for config and client state.
//!
//! All persisted files are written temp file → fsync → rename so a crash
//! mid-write never leaves a corrupt file behind.

use crate::error::{ClientError, Result};
use std::io::Write;
use std::path::Path;

/// Write bytes to `path` atomically (temp file → fsync → rename).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ClientError::Storage(format!(
                "failed to create state directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        ClientError::Storage(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;

    file.write_all(bytes)
        .map_err(|e| ClientError::Storage(format!("failed to write temp file: {e}")))?;

    file.sync_all()
        .map_err(|e| ClientError::Storage(format!("failed to sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        ClientError::Storage(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| ClientError::Storage(format!("failed to serialize state: {e}")))?;
    write_atomic(path, &json)
}
