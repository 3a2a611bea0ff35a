//! Configuration management for twcbus
//!
//! Loads the YAML configuration describing which charger to poll, how the
//! two bus services are named and numbered, and how often each cycle runs.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TWCBUS_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Charger hosts or IPs, tried in order until one responds
    pub hosts: Vec<String>,

    /// D-Bus service name of the charger device
    pub service_name: String,

    /// D-Bus service name of the temperature display proxy
    pub temperature_service_name: String,

    /// Device instance of the charger service
    pub device_instance: u32,

    /// Run next to a production instance without colliding with it
    pub dryrun: bool,

    /// Added to device instances in dryrun mode
    pub dryrun_instance_offset: u32,

    /// User visible name of the wallbox, prefix of the display labels
    pub name: String,

    /// Product name; the serial number is appended at startup
    pub product_name: String,

    /// `/CustomName` of the charger service
    pub custom_name: String,

    /// Vitals polling interval in milliseconds
    pub fast_interval_ms: u64,

    /// Lifetime polling interval in milliseconds
    pub slow_interval_ms: u64,

    /// Per-request HTTP timeout in milliseconds
    pub http_timeout_ms: u64,

    /// Pause between host candidates at startup
    pub connect_retry_delay_ms: u64,

    /// What the temperature service shows
    pub display: DisplayMode,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Value mirrored onto the temperature service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Handle temperature in degrees
    #[default]
    HandleTemperature,
    /// Charging power in kW while charging, set current otherwise
    ChargerStatus,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console level override
    pub console_level: Option<String>,

    /// Optional file level override
    pub file_level: Option<String>,

    /// Directory (or file path whose parent is used) for rotated logs
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to log to a rotated file
    pub file_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `$TWCBUS_CONFIG` or the default locations
    pub fn load() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            let config = Self::from_file(&explicit)?;
            config.validate()?;
            return Ok(config);
        }

        let default_paths = [
            "twcbus_config.yaml",
            "/data/twcbus_config.yaml",
            "/etc/twcbus/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                let config = Self::from_file(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        // Fall back to default configuration
        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(BridgeError::validation(
                "hosts",
                "At least one charger host is required",
            ));
        }
        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(BridgeError::validation(
                "hosts",
                "Host entries cannot be empty",
            ));
        }
        if self.service_name.trim().is_empty() {
            return Err(BridgeError::validation(
                "service_name",
                "Service name cannot be empty",
            ));
        }
        if self.temperature_service_name.trim().is_empty() {
            return Err(BridgeError::validation(
                "temperature_service_name",
                "Service name cannot be empty",
            ));
        }
        if self.fast_interval_ms == 0 {
            return Err(BridgeError::validation(
                "fast_interval_ms",
                "Must be greater than 0",
            ));
        }
        if self.slow_interval_ms == 0 {
            return Err(BridgeError::validation(
                "slow_interval_ms",
                "Must be greater than 0",
            ));
        }
        if self.http_timeout_ms == 0 {
            return Err(BridgeError::validation(
                "http_timeout_ms",
                "Must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Charger service name, suffixed with `_dryrun` when not in production
    pub fn effective_service_name(&self) -> String {
        Self::with_dryrun_suffix(&self.service_name, self.dryrun)
    }

    /// Temperature service name, suffixed with `_dryrun` when not in production
    pub fn effective_temperature_service_name(&self) -> String {
        Self::with_dryrun_suffix(&self.temperature_service_name, self.dryrun)
    }

    /// Device instance of the charger service
    pub fn effective_device_instance(&self) -> u32 {
        self.offset_instance(self.device_instance)
    }

    /// Device instance of the temperature service.
    ///
    /// In dryrun mode the offset is applied on top of the already shifted
    /// charger instance, so the two never share a number.
    pub fn temperature_device_instance(&self) -> u32 {
        self.offset_instance(self.effective_device_instance())
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    fn offset_instance(&self, instance: u32) -> u32 {
        if self.dryrun {
            instance.saturating_add(self.dryrun_instance_offset)
        } else {
            instance
        }
    }

    fn with_dryrun_suffix(name: &str, dryrun: bool) -> String {
        if dryrun {
            format!("{}_dryrun", name)
        } else {
            name.to_string()
        }
    }
}
