#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use relaunch::config::{BeforeStepConfig, ConfigFile, ProfileConfig, RawConfigFile, SettingsSection};
use relaunch::profile::RunProfile;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                settings: SettingsSection::default(),
                profile: BTreeMap::new(),
            },
        }
    }

    pub fn with_profile(mut self, name: &str, profile: ProfileConfig) -> Self {
        self.config.profile.insert(name.to_string(), profile);
        self
    }

    pub fn with_wait_millis(mut self, initial: u64, interval: u64) -> Self {
        self.config.settings.wait_initial_delay_ms = initial;
        self.config.settings.wait_interval_ms = interval;
        self
    }

    pub fn with_max_wait_checks(mut self, max: u32) -> Self {
        self.config.settings.max_wait_checks = Some(max);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProfileConfig`.
pub struct ProfileConfigBuilder {
    profile: ProfileConfig,
}

impl ProfileConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            profile: ProfileConfig {
                cmd: cmd.to_string(),
                cwd: None,
                env: BTreeMap::new(),
                display_name: None,
                singleton: false,
                must_stop_for: None,
                detach: false,
                before: vec![],
            },
        }
    }

    pub fn singleton(mut self) -> Self {
        self.profile.singleton = true;
        self
    }

    pub fn must_stop_for(mut self, target: &str) -> Self {
        self.profile
            .must_stop_for
            .get_or_insert_with(Vec::new)
            .push(target.to_string());
        self
    }

    pub fn detach(mut self) -> Self {
        self.profile.detach = true;
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.profile.display_name = Some(name.to_string());
        self
    }

    pub fn before(mut self, provider: &str, cmd: Option<&str>) -> Self {
        self.profile.before.push(BeforeStepConfig {
            provider: provider.to_string(),
            cmd: cmd.map(String::from),
        });
        self
    }

    pub fn build(self) -> ProfileConfig {
        self.profile
    }
}

/// Shortcut: a ready-to-use `Arc<RunProfile>` straight from a builder.
pub fn run_profile(name: &str, builder: ProfileConfigBuilder) -> Arc<RunProfile> {
    Arc::new(RunProfile::from_config(name.to_string(), &builder.build()))
}
