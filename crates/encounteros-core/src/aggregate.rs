//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots whose state is persisted as whole snapshots.
///
/// Every committed mutation bumps the revision by exactly one and records one
/// uncommitted event describing it.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current revision (number of committed mutations).
    fn revision(&self) -> u64;

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);
}
