//! Whole-file replacement helpers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use encounteros_core::error::DomainError;
use tokio::io::AsyncWriteExt;

/// Sibling path used for the in-progress write: `encounter.json.tmp`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces `path` with `bytes`: write the temp file, fsync it, then rename
/// it over the target.
///
/// # Errors
///
/// Returns `DomainError::IoFault` if any step fails. The target is left as
/// it was.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Reads a whole file, treating a missing file as `None`.
///
/// # Errors
///
/// Returns `DomainError::IoFault` for any other read failure.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DomainError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
