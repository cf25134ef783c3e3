//! History configuration loaded from TOML.
//!
//! ```toml
//! [history]
//! max_undo = 200
//! merge_window_ms = 1500
//! ```
//!
//! Both keys are optional; missing keys fall back to the engine defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::unit_of_work::{DEFAULT_MAX_UNDO, DEFAULT_MERGE_WINDOW, UowError, UowResult};

/// Undo history settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept; the oldest is dropped beyond it.
    pub max_undo: usize,
    /// Window, in milliseconds, within which same-shaped edits merge.
    pub merge_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
            merge_window_ms: DEFAULT_MERGE_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    history: HistoryConfig,
}

impl HistoryConfig {
    pub fn merge_window(&self) -> Duration {
        Duration::from_millis(self.merge_window_ms)
    }

    /// Parses the `[history]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> UowResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| UowError::Config(format!("failed to parse config: {e}")))?;
        Ok(file.history)
    }

    /// Loads the config from a TOML file.
    ///
    /// Returns `Err` with a human-readable message if the file cannot be read
    /// or parsed.
    pub fn load(path: &Path) -> UowResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UowError::Config(format!("failed to read {}: {e}", path.display())))?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| UowError::Config(format!("failed to parse {}: {e}", path.display())))?;
        Ok(file.history)
    }

    /// Like [`load`](Self::load), but falls back to defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("using default history config: {e}");
                Self::default()
            }
        }
    }
}
