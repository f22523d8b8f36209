//! Domain model for the Encounter context.

pub mod aggregates;
pub mod combatant;
pub mod commands;
pub mod dialog;
pub mod events;
pub mod snapshot;
pub mod turn;
