// src/profile/mod.rs

//! Run profiles: the logical "what to run" plus its restart policies.

use std::collections::BTreeMap;

use crate::config::model::{BeforeStepConfig, ConfigFile, ProfileConfig};

/// Canonical profile identifier used throughout the crate.
///
/// Two launches are "of the same type" exactly when their profile ids are
/// equal.
pub type ProfileId = String;

/// A validated, runtime-ready run profile.
#[derive(Debug, Clone)]
pub struct RunProfile {
    pub id: ProfileId,

    /// Name shown in prompts and logs; falls back to the profile id.
    pub display_name: String,

    /// Shell command line to launch.
    pub cmd: String,

    pub cwd: Option<String>,
    pub env: BTreeMap<String, String>,

    /// At most one concurrent instance of this profile may run.
    pub singleton: bool,

    /// Compatibility capability: when `Some`, a *running* instance of this
    /// profile declares it must be stopped before any of the listed target
    /// profiles may start. `None` means the profile does not support
    /// compatibility checks at all.
    pub must_stop_for: Option<Vec<ProfileId>>,

    /// Stopping this profile detaches instead of destroying by default.
    pub detach_is_default: bool,

    /// Ordered pre-launch steps.
    pub before: Vec<BeforeStep>,
}

/// One pre-launch step, resolved by provider id at execution time.
#[derive(Debug, Clone)]
pub struct BeforeStep {
    pub provider: String,
    pub cmd: Option<String>,
}

impl BeforeStep {
    fn from_config(cfg: &BeforeStepConfig) -> Self {
        Self {
            provider: cfg.provider.clone(),
            cmd: cfg.cmd.clone(),
        }
    }
}

impl RunProfile {
    /// Construct a profile from a validated config entry.
    pub fn from_config(id: ProfileId, cfg: &ProfileConfig) -> Self {
        let display_name = cfg.display_name.clone().unwrap_or_else(|| id.clone());
        Self {
            id,
            display_name,
            cmd: cfg.cmd.clone(),
            cwd: cfg.cwd.clone(),
            env: cfg.env.clone(),
            singleton: cfg.singleton,
            must_stop_for: cfg.must_stop_for.clone(),
            detach_is_default: cfg.detach,
            before: cfg.before.iter().map(BeforeStep::from_config).collect(),
        }
    }

    /// Whether this profile supports compatibility checks.
    pub fn supports_compatibility_check(&self) -> bool {
        self.must_stop_for.is_some()
    }

    /// Whether a running instance of this profile must be stopped before
    /// `target` may start.
    ///
    /// Always `false` when the compatibility capability is absent.
    pub fn must_be_stopped_for(&self, target: &ProfileId) -> bool {
        match &self.must_stop_for {
            Some(targets) => targets.iter().any(|t| t == target),
            None => false,
        }
    }
}

/// Build the full profile table from a validated config.
pub fn profiles_from_config(cfg: &ConfigFile) -> BTreeMap<ProfileId, RunProfile> {
    cfg.profile
        .iter()
        .map(|(name, pc)| (name.clone(), RunProfile::from_config(name.clone(), pc)))
        .collect()
}
