//! EncounterOS: Input Router.
//!
//! Turns raw key presses and forwarded hotkeys into logical actions, decides
//! which process owns each one, and resolves actions into encounter commands
//! on the controller.

pub mod application;
pub mod domain;
