//! Atomic artifact writes.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::emit::emitter::EmitError;

/// Write `bytes` to `path` through a uniquely named temporary file in the
/// same directory, then rename it over the target.
///
/// Readers see either the old artifact or the complete new one.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EmitError> {
    let io_error = |source| EmitError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, "output path has no file name")))?;
    let temp = temp_path(path, file_name);

    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(io_error(e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(io_error(e));
    }

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Artifact written");
    Ok(())
}

fn temp_path(path: &Path, file_name: &str) -> PathBuf {
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
}
