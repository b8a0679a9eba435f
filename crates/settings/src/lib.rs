//! OnionMesh Settings
//!
//! Configuration shared by the registry, relay and user nodes.
//!
//! ## Features
//!
//! - Network addressing (host, registry port, base ports, request timeout)
//! - Routing (path length, local network size)
//! - JSON file storage under `~/.onionmesh`
//!
//! ## Usage
//!
//! ```no_run
//! use onionmesh_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.routing.path_length = 4;
//! settings.save()?;
//!
//! println!("registry at {}", settings.network.registry_url());
//! # Ok::<(), onionmesh_settings::SettingsError>(())
//! ```

mod config;

pub use config::{NetworkSettings, RoutingSettings, Settings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// `~/.onionmesh`, or `./.onionmesh` when no home directory is known
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".onionmesh")
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
