//! Domain model for the Input Router.

pub mod actions;
pub mod keymap;
