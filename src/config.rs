use crate::constants::{DEFAULT_MAX_COMMAND_LENGTH, DEFAULT_RESPONSE_QUEUE_CAPACITY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: IpAddr,
    pub listen_port: u16,
    pub greeting: String,
    /// Replies queued ahead of a slow client before dispatch blocks.
    pub response_queue_capacity: usize,
    pub idle_timeout_secs: u64,
    pub data_connection_timeout_secs: u64,
    pub max_command_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::from([0, 0, 0, 0]),
            listen_port: 2121,
            greeting: String::from("ftpcontrold ready"),
            response_queue_capacity: DEFAULT_RESPONSE_QUEUE_CAPACITY,
            idle_timeout_secs: 600,
            data_connection_timeout_secs: 30,
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn data_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.data_connection_timeout_secs)
    }
}

/// Passive mode settings. Without a complete port range the OS picks the port.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PasvConfig {
    pub min_port: Option<u16>,
    pub max_port: Option<u16>,
    /// Advertised in `227` replies instead of the control connection's local address.
    pub public_address: Option<IpAddr>,
    pub public_address_v6: Option<IpAddr>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub anonymous: bool,
    /// Lines of `user:bcrypt-hash`.
    pub passwd_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            anonymous: true,
            passwd_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/ftp"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pasv: PasvConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        Ok(config)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.listen_port, 2121);
        assert_eq!(config.server.response_queue_capacity, 3);
        assert!(config.pasv.min_port.is_none());
        assert!(config.auth.anonymous);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            listen_port = 21

            [pasv]
            min_port = 50000
            max_port = 50100
            public_address = "203.0.113.7"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen_port, 21);
        assert_eq!(config.server.idle_timeout_secs, 600);
        assert_eq!(config.pasv.min_port, Some(50000));
        assert_eq!(config.pasv.public_address, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml("[server]\nlisten_port = \"x\"").is_err());
    }
}
