//! Shared test mocks and utilities for the EncounterOS encounter engine.

mod channel;
mod clock;
mod repository;
mod rng;

pub use channel::InMemoryCommandChannel;
pub use clock::{FixedClock, ManualClock};
pub use repository::{FailingSnapshotRepository, RecordingSnapshotRepository};
pub use rng::{MockRng, SequenceRng};
