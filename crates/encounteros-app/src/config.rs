//! Environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use encounteros_input::application::router::Role;

use crate::error::AppError;

/// Lower bound for the poll interval.
pub const MIN_POLL_MS: u64 = 100;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_POLL_MS: u64 = 200;
const DEFAULT_STALE_AFTER_MS: u64 = 5000;
const DEFAULT_WRITE_RETRIES: u32 = 2;

/// Runtime configuration of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Which side of the protocol to run.
    pub role: Role,
    /// Directory holding the snapshot, queue, preferences and session log.
    pub data_dir: PathBuf,
    /// Reader poll and controller drain interval.
    pub poll_interval: Duration,
    /// How long the display may go without a good read before it reports
    /// the connection as lost.
    pub stale_after: Duration,
    /// Extra attempts for a failed snapshot write.
    pub write_retries: u32,
    /// Name that forwarded input must target.
    pub process_name: String,
    /// Encounter file loaded by the controller.
    pub encounter_file: Option<PathBuf>,
}

impl AppConfig {
    /// Reads `ENCOUNTEROS_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_env(role: Role) -> Result<Self, AppError> {
        Self::from_lookup(role, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_lookup<F>(role: Role, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_ms = parse_or(var("ENCOUNTEROS_POLL_MS"), "ENCOUNTEROS_POLL_MS", DEFAULT_POLL_MS)?;
        let stale_after_ms = parse_or(
            var("ENCOUNTEROS_STALE_AFTER_MS"),
            "ENCOUNTEROS_STALE_AFTER_MS",
            DEFAULT_STALE_AFTER_MS,
        )?;
        let write_retries = parse_or(
            var("ENCOUNTEROS_WRITE_RETRIES"),
            "ENCOUNTEROS_WRITE_RETRIES",
            DEFAULT_WRITE_RETRIES,
        )?;

        Ok(Self {
            role,
            data_dir: var("ENCOUNTEROS_DATA_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
            poll_interval: Duration::from_millis(poll_ms.max(MIN_POLL_MS)),
            stale_after: Duration::from_millis(stale_after_ms),
            write_retries,
            process_name: var("ENCOUNTEROS_PROCESS_NAME")
                .map_or_else(|| role.as_str().to_owned(), |v| v.trim().to_owned()),
            encounter_file: var("ENCOUNTEROS_ENCOUNTER_FILE").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a non-negative integer: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(role: Role, vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(role, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(Role::Display, &[]).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.stale_after, Duration::from_millis(5000));
        assert_eq!(config.write_retries, 2);
        assert_eq!(config.process_name, "display");
        assert!(config.encounter_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(
            Role::Controller,
            &[
                ("ENCOUNTEROS_DATA_DIR", "/srv/encounter"),
                ("ENCOUNTEROS_POLL_MS", "350"),
                ("ENCOUNTEROS_STALE_AFTER_MS", "1500"),
                ("ENCOUNTEROS_WRITE_RETRIES", "0"),
                ("ENCOUNTEROS_PROCESS_NAME", "GM Window"),
                ("ENCOUNTEROS_ENCOUNTER_FILE", "crypt.yaml"),
            ],
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/encounter"));
        assert_eq!(config.poll_interval, Duration::from_millis(350));
        assert_eq!(config.stale_after, Duration::from_millis(1500));
        assert_eq!(config.write_retries, 0);
        assert_eq!(config.process_name, "GM Window");
        assert_eq!(config.encounter_file, Some(PathBuf::from("crypt.yaml")));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let config = config_with(Role::Display, &[("ENCOUNTEROS_POLL_MS", "10")]).unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(MIN_POLL_MS));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let result = config_with(Role::Display, &[("ENCOUNTEROS_POLL_MS", "fast")]);

        match result.unwrap_err() {
            AppError::Config(msg) => assert!(msg.contains("ENCOUNTEROS_POLL_MS")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_with(
            Role::Controller,
            &[("ENCOUNTEROS_DATA_DIR", "  "), ("ENCOUNTEROS_ENCOUNTER_FILE", "")],
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.encounter_file.is_none());
    }
}
