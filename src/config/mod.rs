// src/config/mod.rs

//! Configuration loading and validation for `relaunch`.
//!
//! - [`model`] holds the serde types mapped from `Relaunch.toml`.
//! - [`loader`] reads and deserializes the file.
//! - [`validate`] turns a [`model::RawConfigFile`] into a validated
//!   [`model::ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BeforeStepConfig, ConfigFile, ProfileConfig, RawConfigFile, SettingsSection,
};
