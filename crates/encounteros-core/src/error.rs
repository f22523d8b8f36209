//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The operation is not legal in the current mode.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation references an unknown combatant or dialog block.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        kind: &'static str,
        /// The identifier that did not resolve.
        id: Uuid,
    },

    /// A turn-order assignment would break density or uniqueness.
    #[error("schedule conflict: {0}")]
    ScheduleConflict(String),

    /// A snapshot was written with a schema version this reader cannot interpret.
    #[error("stale sync: snapshot schema version {found}, supported {supported}")]
    SyncStale {
        /// The schema version found on disk.
        found: u32,
        /// The schema version this build understands.
        supported: u32,
    },

    /// A durable read or write failed.
    #[error("I/O fault: {0}")]
    IoFault(String),

    /// Malformed input rejected before touching any state.
    #[error("validation error: {0}")]
    Validation(String),
}

impl DomainError {
    /// Builds a `NotFound` error for a combatant.
    #[must_use]
    pub fn combatant_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: "combatant",
            id,
        }
    }

    /// Builds a `NotFound` error for a dialog block.
    #[must_use]
    pub fn block_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: "dialog block",
            id,
        }
    }

    /// Whether a reader should keep its last-good projection and retry on the
    /// next poll instead of surfacing the error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncStale { .. } | Self::IoFault(_))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::IoFault(err.to_string())
    }
}
