//! Configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use onionmesh_core::config::{
    routes, BASE_ONION_ROUTER_PORT, BASE_USER_PORT, DEFAULT_HOST, DEFAULT_PATH_LENGTH,
    REGISTRY_PORT,
};
use onionmesh_core::NodeId;

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub routing: RoutingSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            settings
        } else {
            Self::default()
        };
        settings.validate()?;
        settings.config_path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Save settings to the path they were loaded from (or the default)
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Reject values no node could run with
    pub fn validate(&self) -> Result<()> {
        if self.routing.path_length == 0 {
            return Err(SettingsError::Invalid(
                "routing.path_length must be at least 1".to_string(),
            ));
        }
        if self.network.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "network.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.network.host.trim().is_empty() {
            return Err(SettingsError::Invalid("network.host is empty".to_string()));
        }
        Ok(())
    }
}

/// Where every component listens and how it is addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_registry_port")]
    pub registry_port: u16,

    /// Relay `n` listens on `relay_base_port + n`
    #[serde(default = "default_relay_base_port")]
    pub relay_base_port: u16,

    /// User `n` listens on `user_base_port + n`
    #[serde(default = "default_user_base_port")]
    pub user_base_port: u16,

    /// Per-request timeout for outbound HTTP calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_registry_port() -> u16 {
    REGISTRY_PORT
}

fn default_relay_base_port() -> u16 {
    BASE_ONION_ROUTER_PORT
}

fn default_user_base_port() -> u16 {
    BASE_USER_PORT
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            registry_port: default_registry_port(),
            relay_base_port: default_relay_base_port(),
            user_base_port: default_user_base_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl NetworkSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn relay_port(&self, id: NodeId) -> u16 {
        offset_port(self.relay_base_port, id)
    }

    pub fn user_port(&self, id: NodeId) -> u16 {
        offset_port(self.user_base_port, id)
    }

    pub fn registry_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.registry_port)
    }

    pub fn relay_bind_addr(&self, id: NodeId) -> String {
        format!("{}:{}", self.host, self.relay_port(id))
    }

    pub fn user_bind_addr(&self, id: NodeId) -> String {
        format!("{}:{}", self.host, self.user_port(id))
    }

    pub fn registry_url(&self) -> String {
        format!("http://{}:{}", self.host, self.registry_port)
    }

    pub fn relay_url(&self, id: NodeId) -> String {
        format!("http://{}:{}", self.host, self.relay_port(id))
    }

    pub fn user_url(&self, id: NodeId) -> String {
        format!("http://{}:{}", self.host, self.user_port(id))
    }

    /// Receive endpoint of relay `id`
    pub fn relay_receive_url(&self, id: NodeId) -> String {
        format!("{}{}", self.relay_url(id), routes::RECEIVE)
    }

    /// Deliver endpoint of user `id`
    pub fn user_deliver_url(&self, id: NodeId) -> String {
        format!("{}{}", self.user_url(id), routes::RECEIVE_MESSAGE)
    }
}

/// Ports wrap rather than overflow for ids past the top of the range
fn offset_port(base: u16, id: NodeId) -> u16 {
    base.wrapping_add((id % (u16::MAX as u32 + 1)) as u16)
}

/// Path selection and local network sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Relays per circuit
    #[serde(default = "default_path_length")]
    pub path_length: usize,

    /// Relays started by `onionmesh network`
    #[serde(default = "default_relay_count")]
    pub relay_count: u32,

    /// Users started by `onionmesh network`
    #[serde(default = "default_user_count")]
    pub user_count: u32,
}

fn default_path_length() -> usize {
    DEFAULT_PATH_LENGTH
}

fn default_relay_count() -> u32 {
    10
}

fn default_user_count() -> u32 {
    2
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            path_length: default_path_length(),
            relay_count: default_relay_count(),
            user_count: default_user_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("onionmesh-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.network.host, "localhost");
        assert_eq!(settings.network.registry_port, 8080);
        assert_eq!(settings.network.relay_base_port, 4000);
        assert_eq!(settings.network.user_base_port, 3000);
        assert_eq!(settings.network.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.routing.path_length, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_address_helpers() {
        let network = NetworkSettings::default();
        assert_eq!(network.registry_url(), "http://localhost:8080");
        assert_eq!(network.relay_receive_url(2), "http://localhost:4002/receive");
        assert_eq!(
            network.user_deliver_url(1),
            "http://localhost:3001/receiveMessage"
        );
        assert_eq!(network.relay_bind_addr(7), "localhost:4007");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"network":{"registry_port":9090}}"#).unwrap();
        assert_eq!(settings.network.registry_port, 9090);
        assert_eq!(settings.network.relay_base_port, 4000);
        assert_eq!(settings.routing, RoutingSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        settings.routing.path_length = 4;
        settings.network.host = "127.0.0.1".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.routing.path_length, 4);
        assert_eq!(loaded.network.host, "127.0.0.1");
        assert_eq!(loaded.config_path(), Some(path.as_path()));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_path("missing");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.network, NetworkSettings::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_zero_path_length_rejected() {
        let path = temp_path("invalid");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, r#"{"routing":{"path_length":0}}"#).unwrap();

        let result = Settings::load_from(&path);
        assert!(matches!(result, Err(SettingsError::Invalid(_))));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let path = temp_path("malformed");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "{ not json").unwrap();

        let result = Settings::load_from(&path);
        assert!(matches!(result, Err(SettingsError::ParseError(_))));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
