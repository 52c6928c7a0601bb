// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{RelaunchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RelaunchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.settings, raw.profile))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_profiles(cfg)?;
    validate_settings(cfg)?;
    validate_profiles(cfg)?;
    Ok(())
}

fn ensure_has_profiles(cfg: &RawConfigFile) -> Result<()> {
    if cfg.profile.is_empty() {
        return Err(RelaunchError::ConfigError(
            "config must contain at least one [profile.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(cfg: &RawConfigFile) -> Result<()> {
    if cfg.settings.wait_interval_ms == 0 {
        return Err(RelaunchError::ConfigError(
            "[settings].wait_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.settings.max_wait_checks == Some(0) {
        return Err(RelaunchError::ConfigError(
            "[settings].max_wait_checks must be >= 1 when set (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_profiles(cfg: &RawConfigFile) -> Result<()> {
    for (name, profile) in cfg.profile.iter() {
        if profile.cmd.trim().is_empty() {
            return Err(RelaunchError::ConfigError(format!(
                "profile '{}' has an empty `cmd`",
                name
            )));
        }

        if let Some(targets) = &profile.must_stop_for {
            for target in targets {
                if !cfg.profile.contains_key(target) {
                    return Err(RelaunchError::ConfigError(format!(
                        "profile '{}' has unknown profile '{}' in `must_stop_for`",
                        name, target
                    )));
                }
                if target == name {
                    return Err(RelaunchError::ConfigError(format!(
                        "profile '{}' cannot list itself in `must_stop_for`",
                        name
                    )));
                }
            }
        }

        for (idx, step) in profile.before.iter().enumerate() {
            if step.provider.trim().is_empty() {
                return Err(RelaunchError::ConfigError(format!(
                    "profile '{}' before-step #{} has an empty `provider`",
                    name,
                    idx + 1
                )));
            }
        }
    }
    Ok(())
}
