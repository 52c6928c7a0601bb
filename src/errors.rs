// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelaunchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("No runner available for profile '{0}'")]
    NoRunner(String),

    #[error("Failed to spawn process for profile '{profile}': {source}")]
    SpawnFailed {
        profile: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Coordinator channel closed: {0}")]
    ChannelClosed(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RelaunchError>;
