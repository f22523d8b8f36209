//! EncounterOS: Encounter bounded context.
//!
//! Owns the canonical encounter state (party, combat, dialog), the turn and
//! dialog state machines that mutate it, and the handlers that commit each
//! mutation as a new durable snapshot.

pub mod application;
pub mod domain;
