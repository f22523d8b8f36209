//! Reader side of the sync protocol.
//!
//! A `SnapshotPoller` loads the durable snapshot at each tick, decides
//! whether it is new, and swaps its projection only when it is. Read and
//! decode failures never clear the projection: the reader keeps showing the
//! last good state and tries again at the next tick.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use encounteros_core::repository::{SnapshotRepository, StoredSnapshot};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identifies which snapshot a reader last applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMarker {
    /// Envelope carries a revision counter.
    Revision {
        /// The encounter.
        encounter_id: Uuid,
        /// Its revision.
        revision: u64,
    },
    /// Envelope without a revision; fall back to a content digest.
    Digest {
        /// The encounter.
        encounter_id: Uuid,
        /// SHA-256 of the serialized state.
        digest: [u8; 32],
    },
}

impl ChangeMarker {
    /// Computes the marker of a snapshot.
    #[must_use]
    pub fn of(snapshot: &StoredSnapshot) -> Self {
        match snapshot.revision {
            Some(revision) => Self::Revision {
                encounter_id: snapshot.encounter_id,
                revision,
            },
            None => Self::Digest {
                encounter_id: snapshot.encounter_id,
                digest: Sha256::digest(snapshot.state.to_string().as_bytes()).into(),
            },
        }
    }

    fn encounter_id(&self) -> Uuid {
        match self {
            Self::Revision { encounter_id, .. } | Self::Digest { encounter_id, .. } => {
                *encounter_id
            }
        }
    }

    /// Whether `self` describes a snapshot the reader has not applied yet,
    /// given the last applied marker.
    #[must_use]
    pub fn is_newer_than(&self, last: Option<&Self>) -> bool {
        let Some(last) = last else {
            return true;
        };
        if self.encounter_id() != last.encounter_id() {
            return true;
        }
        match (self, last) {
            (Self::Revision { revision, .. }, Self::Revision { revision: seen, .. }) => {
                revision > seen
            }
            _ => self != last,
        }
    }
}

/// Result of one poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// A new snapshot was applied; the projection changed.
    Updated {
        /// Revision of the applied snapshot, if it carried one.
        revision: Option<u64>,
    },
    /// The snapshot on disk is the one already applied.
    Unchanged,
    /// Nothing has been written yet.
    Missing,
    /// The snapshot could not be read or interpreted; the previous
    /// projection is retained.
    Rejected(DomainError),
}

/// Turns a snapshot envelope into whatever the reader renders.
pub type SnapshotDecoder<V> =
    Box<dyn Fn(&StoredSnapshot) -> Result<V, DomainError> + Send + Sync>;

/// Polls a snapshot repository and keeps the last good projection.
pub struct SnapshotPoller<V> {
    repo: Arc<dyn SnapshotRepository>,
    decode: SnapshotDecoder<V>,
    stale_after: Duration,
    last_marker: Option<ChangeMarker>,
    projection: Option<V>,
    last_contact: Option<DateTime<Utc>>,
}

impl<V: fmt::Debug> fmt::Debug for SnapshotPoller<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotPoller")
            .field("last_marker", &self.last_marker)
            .field("projection", &self.projection)
            .field("last_contact", &self.last_contact)
            .finish_non_exhaustive()
    }
}

impl<V> SnapshotPoller<V> {
    /// Creates a poller. `stale_after` is how long the reader may go
    /// without a successful read before it reports itself stale.
    #[must_use]
    pub fn new(
        repo: Arc<dyn SnapshotRepository>,
        decode: SnapshotDecoder<V>,
        stale_after: std::time::Duration,
    ) -> Self {
        Self {
            repo,
            decode,
            stale_after: Duration::from_std(stale_after).unwrap_or(Duration::MAX),
            last_marker: None,
            projection: None,
            last_contact: None,
        }
    }

    /// The last successfully applied projection.
    #[must_use]
    pub fn projection(&self) -> Option<&V> {
        self.projection.as_ref()
    }

    /// Marker of the last applied snapshot.
    #[must_use]
    pub fn last_marker(&self) -> Option<ChangeMarker> {
        self.last_marker
    }

    /// Whether the last successful read is older than the staleness
    /// threshold. A poller that never read successfully is stale.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.last_contact
            .is_none_or(|contact| now.signed_duration_since(contact) > self.stale_after)
    }

    /// Reads the snapshot once and applies it if it is new.
    pub async fn poll(&mut self, clock: &dyn Clock) -> PollOutcome {
        let snapshot = match self.repo.load_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.last_contact = Some(clock.now());
                return PollOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot read failed, keeping last projection");
                return PollOutcome::Rejected(e);
            }
        };

        let marker = ChangeMarker::of(&snapshot);
        if !marker.is_newer_than(self.last_marker.as_ref()) {
            self.last_contact = Some(clock.now());
            return PollOutcome::Unchanged;
        }

        match (self.decode)(&snapshot) {
            Ok(projection) => {
                self.projection = Some(projection);
                self.last_marker = Some(marker);
                self.last_contact = Some(clock.now());
                tracing::debug!(revision = snapshot.revision, "projection updated");
                PollOutcome::Updated {
                    revision: snapshot.revision,
                }
            }
            Err(e) => {
                tracing::warn!(
                    revision = snapshot.revision,
                    error = %e,
                    "snapshot rejected, keeping last projection"
                );
                PollOutcome::Rejected(e)
            }
        }
    }
}
