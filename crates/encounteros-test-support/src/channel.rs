//! Test channel: in-memory `CommandChannel` implementation for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use encounteros_core::error::DomainError;
use encounteros_core::repository::{CommandChannel, QueuedCommand};
use uuid::Uuid;

#[derive(Debug)]
struct ChannelState<T> {
    next_seq: u64,
    entries: Vec<QueuedCommand<T>>,
}

/// A command channel held entirely in memory. Entries are stamped with a
/// fixed timestamp so assertions stay deterministic.
#[derive(Debug)]
pub struct InMemoryCommandChannel<T> {
    state: Mutex<ChannelState<T>>,
}

impl<T> InMemoryCommandChannel<T> {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                next_seq: 1,
                entries: Vec::new(),
            }),
        }
    }
}

impl<T> Default for InMemoryCommandChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> CommandChannel<T> for InMemoryCommandChannel<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn append(&self, delivery_id: Uuid, action: T) -> Result<u64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push(QueuedCommand {
            seq,
            delivery_id,
            enqueued_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            action,
        });
        Ok(seq)
    }

    async fn pending(&self) -> Result<Vec<QueuedCommand<T>>, DomainError> {
        Ok(self.state.lock().unwrap().entries.clone())
    }

    async fn acknowledge(&self, through_seq: u64) -> Result<usize, DomainError> {
        let mut state = self.state.lock().unwrap();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.seq > through_seq);
        Ok(before - state.entries.len())
    }
}
