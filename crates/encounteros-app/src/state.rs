//! Shared process context.

use std::sync::Arc;

use encounteros_core::clock::{Clock, SystemClock};
use encounteros_core::repository::{CommandChannel, SnapshotRepository};
use encounteros_input::domain::actions::Action;
use encounteros_sync::display_preferences::DisplayPreferencesFile;
use encounteros_sync::file_command_queue::FileCommandQueue;
use encounteros_sync::file_snapshot_repository::FileSnapshotRepository;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::session_log::SessionLog;

/// Collaborators shared by the controller and the display.
#[derive(Clone)]
pub struct AppState {
    /// Configuration the process was started with.
    pub config: AppConfig,
    /// Clock for deterministic timestamps.
    pub clock: Arc<dyn Clock>,
    /// Durable encounter snapshot.
    pub snapshots: Arc<dyn SnapshotRepository>,
    /// Reverse channel from the display to the controller.
    pub commands: Arc<dyn CommandChannel<Action>>,
    /// Display-only preferences.
    pub preferences: DisplayPreferencesFile,
    /// Activity log written by the controller.
    pub session_log: SessionLog,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("preferences", &self.preferences)
            .field("session_log", &self.session_log)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state from explicit collaborators.
    #[must_use]
    pub fn new(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        snapshots: Arc<dyn SnapshotRepository>,
        commands: Arc<dyn CommandChannel<Action>>,
    ) -> Self {
        let preferences = DisplayPreferencesFile::new(&config.data_dir);
        let session_log = SessionLog::new(&config.data_dir);
        Self {
            config,
            clock,
            snapshots,
            commands,
            preferences,
            session_log,
        }
    }

    /// Wires the file-backed protocol under `config.data_dir` with the
    /// system clock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the data directory cannot be created.
    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let snapshots = Arc::new(FileSnapshotRepository::new(&config.data_dir)?);
        let commands = Arc::new(FileCommandQueue::<Action>::new(
            &config.data_dir,
            Arc::clone(&clock),
        )?);
        Ok(Self::new(config, clock, snapshots, commands))
    }
}
