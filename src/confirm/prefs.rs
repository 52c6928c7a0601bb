// src/confirm/prefs.rs

//! Persisted confirmation preferences.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// The two "ask before doing this" flags, stored as a small TOML file
/// (default `.relaunch/confirm.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPrefs {
    /// Ask before stopping-and-rerunning a singleton profile.
    #[serde(default = "default_true")]
    pub confirm_rerun: bool,

    /// Ask before stopping incompatible runs.
    #[serde(default = "default_true")]
    pub confirm_stop_incompatible: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConfirmPrefs {
    fn default() -> Self {
        Self {
            confirm_rerun: true,
            confirm_stop_incompatible: true,
        }
    }
}

impl ConfirmPrefs {
    /// Load preferences, falling back to defaults when the file does not
    /// exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let prefs: ConfirmPrefs = toml::from_str(&contents)?;
        Ok(prefs)
    }

    /// Write preferences, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string(self).map_err(anyhow::Error::from)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
