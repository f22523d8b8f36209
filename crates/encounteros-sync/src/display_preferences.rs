//! Display-only preferences in `display.json`.
//!
//! This file is the display process's one write channel besides the command
//! queue. The controller never writes it; either side re-reads it on
//! `ReloadFiles`.

use std::path::{Path, PathBuf};

use encounteros_core::error::DomainError;
use serde::{Deserialize, Serialize};

use crate::DISPLAY_PREFERENCES_FILE;
use crate::atomic_file::{read_optional, write_atomic};

/// How portraits and backgrounds are scaled to the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFit {
    /// Letterbox to fit entirely.
    #[default]
    Contain,
    /// Fill and crop.
    Cover,
    /// Fill and distort.
    Stretch,
}

fn default_theme() -> String {
    "gm-modern".to_owned()
}

fn default_fullscreen() -> bool {
    true
}

/// Presentation preferences of the display surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPreferences {
    /// Theme name.
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Image scaling.
    #[serde(default)]
    pub fit: ImageFit,
    /// Borderless fullscreen.
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,
    /// Monitor index; `None` lets the window manager decide.
    #[serde(default)]
    pub screen: Option<usize>,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            fit: ImageFit::default(),
            fullscreen: default_fullscreen(),
            screen: None,
        }
    }
}

/// `<data_dir>/display.json`.
#[derive(Debug, Clone)]
pub struct DisplayPreferencesFile {
    path: PathBuf,
}

impl DisplayPreferencesFile {
    /// Points at the preferences file inside `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(DISPLAY_PREFERENCES_FILE),
        }
    }

    /// Loads the preferences. A missing or unparseable file yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the file exists but cannot be read.
    pub async fn load(&self) -> Result<DisplayPreferences, DomainError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(DisplayPreferences::default());
        };
        match serde_json::from_slice(&bytes) {
            Ok(preferences) => Ok(preferences),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring malformed display preferences"
                );
                Ok(DisplayPreferences::default())
            }
        }
    }

    /// Replaces the preferences file atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the write fails.
    pub async fn save(&self, preferences: &DisplayPreferences) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(preferences).map_err(|e| {
            DomainError::IoFault(format!("failed to encode display preferences: {e}"))
        })?;
        write_atomic(&self.path, &bytes).await
    }
}
