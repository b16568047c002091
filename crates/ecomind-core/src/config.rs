//! Node configuration.
//!
//! Loaded from TOML. Every section has defaults, so an empty file (or no
//! file at all) gives a node that reports simulated readings to
//! `127.0.0.1:5005` every 5 seconds.
//!
//! ```toml
//! device_id = "rak_nodo_01"
//!
//! [network]
//! ssid = "EcoMind"
//! password = "secret"
//! connect_attempts = 10
//! connect_delay_ms = 500
//!
//! [collector]
//! host = "192.168.1.10"
//! port = 5005
//!
//! [report]
//! interval_ms = 5000
//! lux_unavailable = "sentinel"
//!
//! [sensors]
//! temp_humidity = "simulated"
//! light = "absent"
//!
//! [sensors.light_calibration]
//! gain = "x1"
//! integration_time_ms = 800
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ecomind_types::LuxPolicy;

use crate::connectivity::{ConnectPolicy, Credentials};
use crate::scheduler::SchedulerOptions;
use crate::sensor::LightCalibration;

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier stamped on every record.
    pub device_id: String,
    /// Network join settings.
    pub network: NetworkConfig,
    /// Where records are sent.
    pub collector: CollectorConfig,
    /// Reporting cadence and encoding.
    pub report: ReportConfig,
    /// Sensor backends.
    pub sensors: SensorConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "rak_nodo_01".to_string(),
            network: NetworkConfig::default(),
            collector: CollectorConfig::default(),
            report: ReportConfig::default(),
            sensors: SensorConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// # Example
    ///
    /// ```
    /// use ecomind_core::NodeConfig;
    ///
    /// let config = NodeConfig::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.device_id.trim().is_empty() {
            errors.push(ValidationError::new("device_id", "device id cannot be empty"));
        }
        errors.extend(self.network.validate());
        errors.extend(self.collector.validate());
        errors.extend(self.report.validate());
        errors.extend(self.sensors.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Network credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.network.ssid, &self.network.password)
    }

    /// Join retry policy.
    pub fn connect_policy(&self) -> ConnectPolicy {
        ConnectPolicy::new(
            self.network.connect_attempts,
            Duration::from_millis(self.network.connect_delay_ms),
        )
    }

    /// Main loop timing.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions::new(Duration::from_millis(self.report.interval_ms))
            .poll_interval(Duration::from_millis(self.report.poll_interval_ms))
    }
}

/// Network join settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name.
    pub ssid: String,
    /// Pre-shared key.
    pub password: String,
    /// Status polls per join attempt.
    pub connect_attempts: u32,
    /// Delay between status polls in milliseconds.
    pub connect_delay_ms: u64,
}

/// Maximum status polls per join attempt.
pub const MAX_CONNECT_ATTEMPTS: u32 = 100;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: "YOUR_SSID".to_string(),
            password: "YOUR_PASSWORD".to_string(),
            connect_attempts: 10,
            connect_delay_ms: 500,
        }
    }
}

impl NetworkConfig {
    /// Validate network configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.ssid.is_empty() {
            errors.push(ValidationError::new("network.ssid", "ssid cannot be empty"));
        }
        if self.connect_attempts == 0 || self.connect_attempts > MAX_CONNECT_ATTEMPTS {
            errors.push(ValidationError::new(
                "network.connect_attempts",
                format!(
                    "connect attempts {} out of range (1-{})",
                    self.connect_attempts, MAX_CONNECT_ATTEMPTS
                ),
            ));
        }
        if self.connect_delay_ms == 0 {
            errors.push(ValidationError::new(
                "network.connect_delay_ms",
                "connect delay must be > 0",
            ));
        }

        errors
    }
}

/// Collector endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Host name or IP address.
    pub host: String,
    /// UDP port.
    pub port: u16,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5005,
        }
    }
}

impl CollectorConfig {
    /// Parse a `host:port` override.
    pub fn parse_endpoint(endpoint: &str) -> Option<Self> {
        let (host, port) = endpoint.rsplit_once(':')?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port: port.parse().ok()?,
        })
    }

    /// Validate collector configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push(ValidationError::new(
                "collector.host",
                "collector host cannot be empty",
            ));
        }
        if self.port == 0 {
            errors.push(ValidationError::new("collector.port", "port cannot be 0"));
        }

        errors
    }
}

/// Reporting cadence and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Minimum time between reports in milliseconds.
    pub interval_ms: u64,
    /// Idle time between loop iterations in milliseconds.
    pub poll_interval_ms: u64,
    /// What to send for lux when the light sensor is unavailable.
    pub lux_unavailable: LuxPolicy,
}

/// Minimum report interval in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 100;
/// Maximum report interval in milliseconds (1 hour).
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            poll_interval_ms: 50,
            lux_unavailable: LuxPolicy::Sentinel,
        }
    }
}

impl ReportConfig {
    /// Validate report configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_ms < MIN_INTERVAL_MS {
            errors.push(ValidationError::new(
                "report.interval_ms",
                format!(
                    "interval {}ms is too short (minimum {}ms)",
                    self.interval_ms, MIN_INTERVAL_MS
                ),
            ));
        } else if self.interval_ms > MAX_INTERVAL_MS {
            errors.push(ValidationError::new(
                "report.interval_ms",
                format!(
                    "interval {}ms is too long (maximum {}ms / 1 hour)",
                    self.interval_ms, MAX_INTERVAL_MS
                ),
            ));
        }
        if self.poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                "report.poll_interval_ms",
                "poll interval must be > 0",
            ));
        } else if self.poll_interval_ms > self.interval_ms {
            errors.push(ValidationError::new(
                "report.poll_interval_ms",
                "poll interval cannot exceed the report interval",
            ));
        }

        errors
    }
}

/// Which driver backs a sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorBackend {
    /// Random plausible values.
    #[default]
    Simulated,
    /// No sensor fitted; the channel runs degraded.
    Absent,
}

/// Sensor backends and light sensor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Temperature/humidity backend.
    pub temp_humidity: SensorBackend,
    /// Ambient light backend.
    pub light: SensorBackend,
    /// Seed for simulated sensors (random if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Light sensor gain, integration time and thresholds. The simulated
    /// backend converts readings with the same gain and integration time.
    pub light_calibration: LightCalibration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            temp_humidity: SensorBackend::Simulated,
            light: SensorBackend::Simulated,
            seed: None,
            light_calibration: LightCalibration::default(),
        }
    }
}

impl SensorConfig {
    /// Validate sensor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let cal = &self.light_calibration;

        if cal.low_threshold > cal.high_threshold {
            errors.push(ValidationError::new(
                "sensors.light_calibration.low_threshold",
                format!(
                    "low threshold {} is above high threshold {}",
                    cal.low_threshold, cal.high_threshold
                ),
            ));
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `collector.port` or `report.interval_ms`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecomind")
        .join("node.toml")
}
