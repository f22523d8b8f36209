//! Durable activity log of committed encounter events.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use encounteros_core::error::DomainError;
use encounteros_core::event::DomainEvent;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// File name of the session log inside the data directory.
pub const SESSION_LOG_FILE: &str = "session.log";

/// One line of the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Revision reached by the event.
    pub revision: u64,
    /// Correlation ID of the command that produced it.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
    /// Serialized event payload.
    pub payload: serde_json::Value,
}

impl LoggedEvent {
    /// Builds a log line from any domain event.
    pub fn from_event(event: &dyn DomainEvent) -> Self {
        let metadata = event.metadata();
        Self {
            event_id: metadata.event_id,
            aggregate_id: metadata.aggregate_id,
            event_type: event.event_type().to_owned(),
            revision: metadata.revision,
            correlation_id: metadata.correlation_id,
            occurred_at: metadata.occurred_at,
            payload: event.to_payload(),
        }
    }
}

/// Append-only JSON-lines log in the data directory.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Creates a log at `<data_dir>/session.log`. The file is created on
    /// first append.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_LOG_FILE),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line per event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the file cannot be written.
    pub async fn append<E: DomainEvent>(&self, events: &[E]) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, &LoggedEvent::from_event(event))
                .map_err(|e| DomainError::IoFault(format!("session log entry: {e}")))?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        tracing::debug!(path = %self.path.display(), count = events.len(), "session log appended");
        Ok(())
    }

    /// Reads every logged event back, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the file cannot be read or a line
    /// is not a valid entry.
    pub async fn read_all(&self) -> Result<Vec<LoggedEvent>, DomainError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| DomainError::IoFault(format!("session log line: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use encounteros_core::event::EventMetadata;
    use encounteros_encounter::domain::events::{EncounterEvent, EncounterEventKind};

    use super::*;

    fn event(revision: u64) -> EncounterEvent {
        EncounterEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: "encounter.combat_exited".into(),
                aggregate_id: Uuid::nil(),
                revision,
                correlation_id: Uuid::new_v4(),
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
            kind: EncounterEventKind::CombatExited,
        }
    }

    #[tokio::test]
    async fn test_append_writes_one_line_per_event() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path());

        // Act
        log.append(&[event(1), event(2)]).await.unwrap();
        log.append(&[event(3)]).await.unwrap();

        // Assert
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        let entries = log.read_all().await.unwrap();
        let revisions: Vec<u64> = entries.iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![1, 2, 3]);
        assert_eq!(entries[0].event_type, "encounter.combat_exited");
    }

    #[tokio::test]
    async fn test_read_all_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path());

        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_append_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path());

        log.append::<EncounterEvent>(&[]).await.unwrap();

        assert!(!log.path().exists());
    }
}
