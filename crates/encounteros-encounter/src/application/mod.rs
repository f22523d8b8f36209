//! Application services for the Encounter context.

pub mod command_handlers;
pub mod encounter_files;
pub mod query_handlers;
