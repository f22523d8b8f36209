//! Test repositories: mock `SnapshotRepository` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use encounteros_core::error::DomainError;
use encounteros_core::repository::{SnapshotRepository, StoredSnapshot};

/// A snapshot repository that keeps every saved snapshot in memory and serves
/// the most recent one from `load_snapshot`.
///
/// It can be told to fail the next `n` saves, which exercises the writer-side
/// retry and rollback paths.
#[derive(Debug, Default)]
pub struct RecordingSnapshotRepository {
    saved: Mutex<Vec<StoredSnapshot>>,
    failures_remaining: AtomicUsize,
}

impl RecordingSnapshotRepository {
    /// Create an empty recording repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository that already holds `snapshot`, as if a previous
    /// controller run had written it.
    #[must_use]
    pub fn with_snapshot(snapshot: StoredSnapshot) -> Self {
        Self {
            saved: Mutex::new(vec![snapshot]),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` calls to `save_snapshot` fail with `IoFault`.
    pub fn fail_next_saves(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Returns a copy of every snapshot that was saved, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<StoredSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotRepository for RecordingSnapshotRepository {
    async fn load_snapshot(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }

    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DomainError::IoFault("disk full".into()));
        }
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// A snapshot repository that always returns an I/O fault. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn load_snapshot(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        Err(DomainError::IoFault("permission denied".into()))
    }

    async fn save_snapshot(&self, _snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        Err(DomainError::IoFault("permission denied".into()))
    }
}
