//! Server configuration parameters
//!
//! All tunable parameters for the EcoWatt cloud backend. Values come from a
//! JSON file (path from the command line or `ECOWATT_CONFIG`) layered over
//! [`ServerConfig::default()`]; `PORT` overrides the listen port.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ECOWATT_CONFIG";

/// Artifacts above this size are refused at upload.
const DEFAULT_MAX_FIRMWARE_SIZE: u64 = 4 * 1024 * 1024; // 4 MB

/// One entry of the static device → pre-shared key map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceKey {
    pub device_id: String,
    pub secret: String,
}

/// Per-device token bucket parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity (burst size).
    pub burst: u64,
    /// Tokens refilled per second.
    pub per_second: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            per_second: 10,
        }
    }
}

/// Telemetry ledger and the `next_config` stub returned to uploading devices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Maximum records kept in memory; the oldest are dropped first.
    pub capacity: usize,
    /// Upload interval advertised to devices (minutes).
    pub upload_interval_min: u32,
    /// Sampling rate advertised to devices (seconds).
    pub sampling_rate_secs: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            upload_interval_min: 15,
            sampling_rate_secs: 5,
        }
    }
}

/// Core server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // --- Network ---
    /// Socket address the HTTP server binds.
    pub bind_addr: String,

    // --- Firmware ---
    /// Chunk size applied to uploads that do not specify one (bytes).
    pub default_chunk_size: u32,
    /// Largest accepted firmware image (bytes).
    pub max_firmware_size: u64,
    /// Directory for firmware blobs; `None` keeps them in memory.
    pub firmware_dir: Option<PathBuf>,

    // --- Devices ---
    /// Static registry of device identities and their pre-shared secrets.
    pub devices: Vec<DeviceKey>,
    pub rate_limit: RateLimitConfig,

    // --- Telemetry ---
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            default_chunk_size: 1024,
            max_firmware_size: DEFAULT_MAX_FIRMWARE_SIZE,
            firmware_dir: None,
            devices: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path` (or defaults when `None`), apply the `PORT`
    /// override, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(port) = std::env::var("PORT") {
            config.apply_port_override(&port)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::Io,
        })?;
        let config = serde_json::from_slice(&raw).map_err(|_| ConfigError::Corrupted)?;
        info!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Replace the port component of `bind_addr`.
    pub fn apply_port_override(&mut self, port: &str) -> Result<(), ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationFailed("PORT must be a valid port number"))?;
        let host = self
            .bind_addr
            .rsplit_once(':')
            .map_or(self.bind_addr.as_str(), |(host, _)| host);
        self.bind_addr = format!("{host}:{port}");
        Ok(())
    }

    /// Reject values that would make the server unsafe or useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_firmware_size == 0 {
            return Err(ConfigError::ValidationFailed("max_firmware_size must be > 0"));
        }
        let chunk = u64::from(self.default_chunk_size);
        if chunk == 0 || chunk > self.max_firmware_size {
            return Err(ConfigError::ValidationFailed(
                "default_chunk_size must be in 1..=max_firmware_size",
            ));
        }
        if self.rate_limit.burst == 0 || self.rate_limit.per_second == 0 {
            return Err(ConfigError::ValidationFailed("rate_limit values must be > 0"));
        }
        if self.telemetry.capacity == 0 {
            return Err(ConfigError::ValidationFailed("telemetry.capacity must be > 0"));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.device_id.is_empty() {
                return Err(ConfigError::ValidationFailed("device_id must not be empty"));
            }
            if device.secret.is_empty() {
                return Err(ConfigError::ValidationFailed("device secret must not be empty"));
            }
            if !seen.insert(device.device_id.as_str()) {
                return Err(ConfigError::ValidationFailed("duplicate device_id"));
            }
        }
        Ok(())
    }
}
