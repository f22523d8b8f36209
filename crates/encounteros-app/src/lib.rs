//! EncounterOS: controller and display processes.
//!
//! The same binary runs either role. The controller owns the encounter and
//! is the only process that writes the snapshot; the display follows the
//! snapshot and relays its input back over the command queue.

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod input_line;
pub mod session_log;
pub mod state;
