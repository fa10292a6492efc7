//! Relay configuration

use anyhow::{Context, Result};
use protocol::crypto::{self, CipherKey};
use protocol::cube::MacAddress;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cube: CubeConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CubeConfig {
    pub mac_address: String,
    /// Hex-encoded 16-byte key; the firmware default when absent
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    #[serde(default)]
    pub format: BroadcastFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub interval_ms: u64,
}

/// Wire format for WebSocket listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastFormat {
    /// Bare notation per move, e.g. `U'`
    #[default]
    Text,
    /// JSON objects for moves and announces
    Json,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            format: BroadcastFormat::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    8765
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .context("Failed to parse config file")?;

        // Fail at load time rather than mid-session
        config.mac_address()?;
        config.cipher_key()?;

        Ok(config)
    }

    pub fn mac_address(&self) -> Result<MacAddress> {
        self.cube
            .mac_address
            .parse()
            .with_context(|| format!("Invalid cube mac_address {:?}", self.cube.mac_address))
    }

    pub fn cipher_key(&self) -> Result<CipherKey> {
        match &self.cube.key {
            Some(hex) => crypto::parse_key(hex).context("Invalid cube key"),
            None => Ok(CipherKey::default()),
        }
    }

    pub fn websocket_addr(&self) -> String {
        format!("{}:{}", self.websocket.bind_address, self.websocket.bind_port)
    }
}
