//! EncounterOS: application error types.

use encounteros_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the controller and display processes.
#[derive(Debug, Error)]
pub enum AppError {
    /// A command-line argument or environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An engine or sync-protocol error that could not be recovered locally.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Terminal or signal I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_converts_and_keeps_message() {
        let err: AppError = DomainError::IoFault("disk full".into()).into();

        assert!(matches!(err, AppError::Domain(DomainError::IoFault(_))));
        assert_eq!(err.to_string(), "domain error: I/O fault: disk full");
    }

    #[test]
    fn test_config_error_message() {
        let err = AppError::Config("missing role".into());

        assert_eq!(err.to_string(), "configuration error: missing role");
    }
}
