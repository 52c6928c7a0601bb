// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [settings]
/// wait_initial_delay_ms = 50
/// wait_interval_ms = 100
///
/// [profile.web]
/// cmd = "python -m http.server"
/// singleton = true
///
/// [profile.db-reset]
/// cmd = "scripts/reset-db.sh"
/// must_stop_for = ["web"]
/// ```
///
/// All sections are optional and have reasonable defaults, except that at
/// least one `[profile.<name>]` must be present (checked in [`validate`]).
///
/// [`validate`]: crate::config::validate
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour from `[settings]`.
    #[serde(default)]
    pub settings: SettingsSection,

    /// All run profiles from `[profile.<name>]`.
    ///
    /// Keys are the profile names (e.g. `"web"`, `"worker"`).
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileConfig>,
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)`; the `new_unchecked`
/// constructor is only meant for the validation module and test builders.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: SettingsSection,
    pub profile: BTreeMap<String, ProfileConfig>,
}

impl ConfigFile {
    pub fn new_unchecked(
        settings: SettingsSection,
        profile: BTreeMap<String, ProfileConfig>,
    ) -> Self {
        Self { settings, profile }
    }
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Delay before the first termination-wait check, in milliseconds.
    #[serde(default = "default_wait_initial_delay_ms")]
    pub wait_initial_delay_ms: u64,

    /// Delay between termination-wait re-checks, in milliseconds.
    #[serde(default = "default_wait_interval_ms")]
    pub wait_interval_ms: u64,

    /// Upper bound on termination-wait checks before the restart is
    /// abandoned. `None` means the wait never gives up.
    #[serde(default)]
    pub max_wait_checks: Option<u32>,

    /// Where confirmation preferences ("don't ask again") are persisted.
    #[serde(default = "default_confirm_prefs_path")]
    pub confirm_prefs_path: String,
}

fn default_wait_initial_delay_ms() -> u64 {
    50
}

fn default_wait_interval_ms() -> u64 {
    100
}

fn default_confirm_prefs_path() -> String {
    ".relaunch/confirm.toml".to_string()
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            wait_initial_delay_ms: default_wait_initial_delay_ms(),
            wait_interval_ms: default_wait_interval_ms(),
            max_wait_checks: None,
            confirm_prefs_path: default_confirm_prefs_path(),
        }
    }
}

/// `[profile.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// The command to execute (run through the platform shell).
    pub cmd: String,

    /// Working directory for the command.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Extra environment variables for the command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Human-readable name shown in prompts and logs.
    ///
    /// If `None`, the profile name is used.
    #[serde(default)]
    pub display_name: Option<String>,

    /// At most one concurrent instance of this profile.
    #[serde(default)]
    pub singleton: bool,

    /// Profiles this one must be stopped for before they may run.
    ///
    /// `None` means the profile does not participate in compatibility
    /// checks at all; `Some(vec![])` participates but conflicts with
    /// nothing.
    #[serde(default)]
    pub must_stop_for: Option<Vec<String>>,

    /// Whether stopping this profile detaches instead of destroying by
    /// default.
    #[serde(default)]
    pub detach: bool,

    /// Ordered pre-launch steps.
    #[serde(default)]
    pub before: Vec<BeforeStepConfig>,
}

/// One entry of a profile's `before = [...]` list.
///
/// ```toml
/// [[profile.web.before]]
/// provider = "shell"
/// cmd = "make build"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BeforeStepConfig {
    /// Provider id this step is resolved by (e.g. `"shell"`).
    pub provider: String,

    /// Provider-specific command payload.
    #[serde(default)]
    pub cmd: Option<String>,
}
