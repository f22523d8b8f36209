//! Application services for the Input Router.

pub mod resolve;
pub mod router;
