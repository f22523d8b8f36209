//! File-backed implementation of the `SnapshotRepository` trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use encounteros_core::error::DomainError;
use encounteros_core::repository::{SnapshotRepository, StoredSnapshot};

use crate::SNAPSHOT_FILE;
use crate::atomic_file::{read_optional, write_atomic};

/// Stores the snapshot envelope as pretty-printed JSON in
/// `<data_dir>/encounter.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotRepository {
    path: PathBuf,
}

impl FileSnapshotRepository {
    /// Creates the repository, creating `data_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the directory cannot be created.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(SNAPSHOT_FILE),
        })
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotRepository for FileSnapshotRepository {
    async fn load_snapshot(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            DomainError::IoFault(format!("unreadable snapshot {}: {e}", self.path.display()))
        })?;
        Ok(Some(snapshot))
    }

    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| DomainError::IoFault(format!("failed to encode snapshot: {e}")))?;
        write_atomic(&self.path, &bytes).await?;
        tracing::debug!(
            revision = snapshot.revision,
            path = %self.path.display(),
            "snapshot written"
        );
        Ok(())
    }
}
