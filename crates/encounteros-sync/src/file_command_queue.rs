//! File-backed implementation of the `CommandChannel` trait.
//!
//! Appends and acknowledgements rewrite `commands.json` under an exclusive
//! lock file, so an append from the display can never be lost to a
//! concurrent drain by the controller. Reads need no lock because the file
//! is always replaced atomically.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use encounteros_core::repository::{CommandChannel, QueuedCommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::COMMAND_QUEUE_FILE;
use crate::atomic_file::{read_optional, write_atomic};

/// Attempts to take the lock before giving up.
const LOCK_ATTEMPTS: u32 = 100;
/// Pause between lock attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
/// A lock older than this is assumed to belong to a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct QueueFile<T> {
    next_seq: u64,
    entries: Vec<QueuedCommand<T>>,
}

impl<T> Default for QueueFile<T> {
    fn default() -> Self {
        Self {
            next_seq: 1,
            entries: Vec::new(),
        }
    }
}

/// Held while the queue file is being rewritten. Dropping it releases the
/// lock.
#[derive(Debug)]
struct QueueLock {
    path: PathBuf,
}

impl QueueLock {
    /// Creates the lock file if nobody holds it.
    async fn try_create(path: &Path) -> Result<Option<Self>, DomainError> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(_) => Ok(Some(Self {
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn acquire(path: &Path) -> Result<Self, DomainError> {
        for _ in 0..LOCK_ATTEMPTS {
            if let Some(lock) = Self::try_create(path).await? {
                return Ok(lock);
            }
            if lock_is_stale(path).await && break_stale_lock(path).await? {
                continue;
            }
            tokio::time::sleep(LOCK_RETRY_DELAY).await;
        }
        Err(DomainError::IoFault(format!(
            "command queue lock {} is held",
            path.display()
        )))
    }
}

fn breaker_path(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.as_os_str().to_os_string();
    name.push(".break");
    PathBuf::from(name)
}

/// Removes a stale lock at `path`. Staleness is checked again while holding
/// `<path>.break`, so a contender that judged the lock stale earlier cannot
/// delete a lock someone else has since taken. Returns whether the lock was
/// removed.
async fn break_stale_lock(path: &Path) -> Result<bool, DomainError> {
    let breaker = breaker_path(path);
    let Some(_breaker) = QueueLock::try_create(&breaker).await? else {
        // Held only across a check and a delete; an old one was abandoned.
        if lock_is_stale(&breaker).await {
            tracing::warn!(path = %breaker.display(), "removing abandoned lock breaker");
            remove_if_present(&breaker).await?;
        }
        return Ok(false);
    };

    if !lock_is_stale(path).await {
        return Ok(false);
    }
    tracing::warn!(path = %path.display(), "breaking stale queue lock");
    remove_if_present(path).await?;
    Ok(true)
}

async fn remove_if_present(path: &Path) -> Result<(), DomainError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release queue lock");
        }
    }
}

async fn lock_is_stale(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Command queue stored in `<data_dir>/commands.json`.
pub struct FileCommandQueue<T> {
    path: PathBuf,
    lock_path: PathBuf,
    clock: Arc<dyn Clock>,
    _action: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for FileCommandQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCommandQueue")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<T> FileCommandQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates the queue, creating `data_dir` if needed. `clock` stamps
    /// appended entries.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the directory cannot be created.
    pub fn new(data_dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, DomainError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(COMMAND_QUEUE_FILE);
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Ok(Self {
            lock_path: PathBuf::from(lock_name),
            path,
            clock,
            _action: PhantomData,
        })
    }

    /// Location of the queue file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<QueueFile<T>, DomainError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(QueueFile::default());
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            DomainError::IoFault(format!("unreadable command queue {}: {e}", self.path.display()))
        })
    }

    async fn write(&self, queue: &QueueFile<T>) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(queue)
            .map_err(|e| DomainError::IoFault(format!("failed to encode command queue: {e}")))?;
        write_atomic(&self.path, &bytes).await
    }
}

#[async_trait]
impl<T> CommandChannel<T> for FileCommandQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, delivery_id: Uuid, action: T) -> Result<u64, DomainError> {
        let _lock = QueueLock::acquire(&self.lock_path).await?;
        let mut queue = self.read().await?;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.entries.push(QueuedCommand {
            seq,
            delivery_id,
            enqueued_at: self.clock.now(),
            action,
        });
        self.write(&queue).await?;
        tracing::debug!(seq, %delivery_id, "command enqueued");
        Ok(seq)
    }

    async fn pending(&self) -> Result<Vec<QueuedCommand<T>>, DomainError> {
        let mut entries = self.read().await?.entries;
        entries.sort_by_key(|entry| entry.seq);
        Ok(entries)
    }

    async fn acknowledge(&self, through_seq: u64) -> Result<usize, DomainError> {
        let _lock = QueueLock::acquire(&self.lock_path).await?;
        let mut queue = self.read().await?;
        let before = queue.entries.len();
        queue.entries.retain(|entry| entry.seq > through_seq);
        let removed = before - queue.entries.len();
        if removed > 0 {
            self.write(&queue).await?;
            tracing::debug!(through_seq, removed, "commands acknowledged");
        }
        Ok(removed)
    }
}
