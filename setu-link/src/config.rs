//! Configuration loading for SetuLink
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration:
//!
//! ```toml
//! [device]
//! id = "guide-phone-1"
//! mode = "Normal"
//!
//! [tcp]
//! addresses = ["192.168.1.50", "guide-robot.local"]
//! port = 5000
//!
//! [serial]
//! enabled = true
//! path = "/dev/rfcomm0"
//!
//! [timing]
//! liveness_timeout_ms = 5000
//! ```

use crate::error::{LinkError, Result};
use crate::messages::ModeType;
use crate::wire::MAX_FRAME_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Room left in a frame for a chunk's envelope and file names
const CHUNK_ENVELOPE_OVERHEAD: usize = 4096;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity reported in every heartbeat
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_id")]
    pub id: String,

    #[serde(default)]
    pub mode: ModeType,
}

/// TCP link settings
#[derive(Clone, Debug, Deserialize)]
pub struct TcpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host candidates, tried in turn while disconnected
    #[serde(default = "default_addresses")]
    pub addresses: Vec<String>,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Serial link settings
#[derive(Clone, Debug, Deserialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_serial_path")]
    pub path: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Session timing, all in milliseconds (chunk size in bytes)
#[derive(Clone, Debug, Deserialize)]
pub struct TimingConfig {
    /// Reconnect poll interval while disconnected (default: 1000)
    #[serde(default = "default_connect_interval")]
    pub connect_interval_ms: u64,

    /// Upper bound on one connection attempt (default: 2000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Heartbeat period while connected (default: 1000)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Maximum silence from the peer before the link is dropped (default: 5000)
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,

    /// Ack timeout for ordinary sends (default: 1000)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Ack timeout for upload chunks (default: 10000)
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_ms: u64,

    /// Liveness failures are ignored this long after the last chunk (default: 10000)
    #[serde(default = "default_chunk_grace")]
    pub chunk_grace_ms: u64,

    /// Upload chunk size before base64 (default: 512 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Which resource bundle to activate at startup
#[derive(Clone, Debug, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_resource_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_device_id() -> String {
    "setu-link".to_string()
}
fn default_addresses() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}
fn default_port() -> u16 {
    5000
}
fn default_serial_path() -> String {
    "/dev/rfcomm0".to_string()
}
fn default_baud_rate() -> u32 {
    115200
}
fn default_connect_interval() -> u64 {
    1000
}
fn default_connect_timeout() -> u64 {
    2000
}
fn default_heartbeat_interval() -> u64 {
    1000
}
fn default_liveness_timeout() -> u64 {
    5000
}
fn default_send_timeout() -> u64 {
    1000
}
fn default_chunk_timeout() -> u64 {
    10000
}
fn default_chunk_grace() -> u64 {
    10000
}
fn default_chunk_size() -> usize {
    512 * 1024
}
fn default_resource_root() -> PathBuf {
    PathBuf::from("resources")
}
fn default_language() -> String {
    "en".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            mode: ModeType::default(),
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            addresses: default_addresses(),
            port: default_port(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_serial_path(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_interval_ms: default_connect_interval(),
            connect_timeout_ms: default_connect_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            liveness_timeout_ms: default_liveness_timeout(),
            send_timeout_ms: default_send_timeout(),
            chunk_timeout_ms: default_chunk_timeout(),
            chunk_grace_ms: default_chunk_grace(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl TimingConfig {
    pub fn connect_interval(&self) -> Duration {
        Duration::from_millis(self.connect_interval_ms)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }
    pub fn chunk_grace(&self) -> Duration {
        Duration::from_millis(self.chunk_grace_ms)
    }
}

impl TimingConfig {
    /// A chunk must be non-empty and fit in one frame once base64-encoded
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(LinkError::Config("timing.chunk_size must be positive".into()));
        }
        let encoded = self.chunk_size.div_ceil(3) * 4;
        if encoded + CHUNK_ENVELOPE_OVERHEAD > MAX_FRAME_SIZE {
            return Err(LinkError::Config(format!(
                "timing.chunk_size {} exceeds the frame limit once encoded",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: default_resource_root(),
            identifier: None,
            language: default_language(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Config(format!("Failed to read config file: {}", e)))?;
        let config: LinkConfig = toml::from_str(&content)?;
        config.timing.validate()?;
        Ok(config)
    }
}
