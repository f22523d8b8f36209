//! EncounterOS: sync protocol.
//!
//! The controller is the single writer of `encounter.json`; readers poll it
//! and relay input back through `commands.json`. Every file is replaced via
//! write-to-temp then rename, so no process ever observes a partial write.

pub mod atomic_file;
pub mod display_preferences;
pub mod file_command_queue;
pub mod file_snapshot_repository;
pub mod snapshot_poller;

/// File name of the durable snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "encounter.json";
/// File name of the command queue inside the data directory.
pub const COMMAND_QUEUE_FILE: &str = "commands.json";
/// File name of the display preferences inside the data directory.
pub const DISPLAY_PREFERENCES_FILE: &str = "display.json";
