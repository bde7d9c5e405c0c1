// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::machine::MachineSettings;
use crate::server::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Sync server settings.
    pub server: ServerConfig,

    /// Beacon serial settings.
    pub serial: SerialConfig,

    /// Response timeouts.
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Line speed of the beacon's USB serial port.
    pub baud_rate: u32,

    /// Port to select on startup when it is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the server to accept a connection, in milliseconds.
    pub server_ms: u64,

    /// Time allowed for the beacon to answer, in milliseconds.
    pub serial_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            preferred_port: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            server_ms: 5000,
            serial_ms: 20000,
        }
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beacon-sync")
        .join("config.toml")
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            return Ok(toml::from_str(&content)?);
        }

        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.host.clone(), self.server.port)
    }

    pub fn settings(&self) -> MachineSettings {
        MachineSettings {
            endpoint: self.endpoint(),
            server_timeout: Duration::from_millis(self.timeouts.server_ms),
            serial_timeout: Duration::from_millis(self.timeouts.serial_ms),
            preferred_port: self.serial.preferred_port.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_machine_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint().url(), "ws://localhost:6969");
        assert_eq!(config.settings(), MachineSettings::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"sync.example.org\"\n\n[serial]\npreferred_port = \"/dev/ttyACM1\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.host, "sync.example.org");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.timeouts.serial_ms, 20000);
        assert_eq!(
            config.settings().preferred_port.as_deref(),
            Some("/dev/ttyACM1")
        );
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.server.port = 7000;
        config.timeouts.server_ms = 1500;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.settings().server_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
