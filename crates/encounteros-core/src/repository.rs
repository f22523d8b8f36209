//! Persistence abstractions for the sync protocol.
//!
//! The controller is the only writer of snapshots. Readers load them and
//! append logical actions to a command channel that the controller drains.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of an aggregate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// Major schema version of `state`.
    pub schema_version: u32,
    /// Aggregate this snapshot belongs to.
    pub encounter_id: Uuid,
    /// Revision of the aggregate at write time. Absent in legacy files.
    #[serde(default)]
    pub revision: Option<u64>,
    /// Timestamp of the write.
    pub written_at: DateTime<Utc>,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

/// One entry in the reverse-direction command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand<T> {
    /// Position in arrival order, strictly increasing per channel.
    pub seq: u64,
    /// Identifier of the physical input event that produced this entry.
    pub delivery_id: Uuid,
    /// When the entry was appended.
    pub enqueued_at: DateTime<Utc>,
    /// The logical action requested.
    pub action: T,
}

/// Repository trait for loading and saving the durable snapshot.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Load the latest committed snapshot, if one has ever been written.
    async fn load_snapshot(&self) -> Result<Option<StoredSnapshot>, DomainError>;

    /// Replace the durable snapshot. Readers must never observe a partial write.
    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError>;
}

/// Append-only command channel from readers back to the controller.
#[async_trait]
pub trait CommandChannel<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Append an action, returning the sequence number it was assigned.
    async fn append(&self, delivery_id: Uuid, action: T) -> Result<u64, DomainError>;

    /// Return every pending entry in arrival order without removing it.
    async fn pending(&self) -> Result<Vec<QueuedCommand<T>>, DomainError>;

    /// Remove entries with `seq <= through_seq`, keeping anything appended
    /// after the caller's read. Returns how many entries were removed.
    async fn acknowledge(&self, through_seq: u64) -> Result<usize, DomainError>;
}
