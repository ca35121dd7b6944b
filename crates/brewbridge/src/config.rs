//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use brewbridge_core::{BridgeSettings, RetryPolicy, TargetConfig};
use eyre::{WrapErr, bail};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the brewbridge daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// MQTT broker settings
    #[serde(default)]
    pub mqtt: MqttConfig,
    /// Homebridge settings
    #[serde(default)]
    pub homebridge: HomebridgeConfig,
    /// Monitored block
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Prefix of the history topics, `/#` is appended when subscribing
    #[serde(default = "default_history_topic")]
    pub history_topic: String,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    /// Delay between reconnect attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
}

impl MqttConfig {
    /// Wait after a broker connection error
    #[must_use]
    pub fn reconnect_after(&self) -> Duration {
        seconds(self.reconnect_delay)
            .unwrap_or_else(|| Duration::from_secs_f64(default_reconnect_delay()))
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            history_topic: default_history_topic(),
            keep_alive: default_keep_alive(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

fn default_mqtt_host() -> String {
    "eventbus".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "brewbridge".to_string()
}

fn default_history_topic() -> String {
    "brewcast/history".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_reconnect_delay() -> f64 {
    5.0
}

/// Homebridge instance (insecure mode) and the driven device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomebridgeConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_homebridge_port")]
    pub port: u16,
    /// PIN sent in the `Authorization` header
    #[serde(default)]
    pub auth_code: String,
    /// Device name as shown by Homebridge
    #[serde(default)]
    pub device: String,
}

impl Default for HomebridgeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_homebridge_port(),
            auth_code: String::new(),
            device: String::new(),
        }
    }
}

fn default_homebridge_port() -> u16 {
    51826
}

/// The followed block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Brewblox service holding the block (record `key`)
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub block_name: String,
    /// Seconds between confirmation reads
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Startup retries before giving up (unbounded when unset)
    #[serde(default)]
    pub startup_attempts: Option<u32>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            service: String::new(),
            block_name: String::new(),
            poll_interval: default_poll_interval(),
            startup_attempts: None,
        }
    }
}

fn default_poll_interval() -> f64 {
    5.0
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// Returns the path the configuration was read from, if any.
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default() -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Ok(path) = std::env::var("BREWBRIDGE_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let paths = [
            Some(PathBuf::from("brewbridge.toml")),
            Some(PathBuf::from("/etc/brewbridge/brewbridge.toml")),
            dirs::config_dir().map(|p| p.join("brewbridge/brewbridge.toml")),
        ];

        match first_existing(paths.into_iter().flatten()) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            // Flags alone can configure the daemon
            None => Ok((Config::default(), None)),
        }
    }

    /// Check required fields and ranges
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> eyre::Result<()> {
        let required = [
            ("bridge.service", &self.bridge.service),
            ("bridge.block_name", &self.bridge.block_name),
            ("homebridge.host", &self.homebridge.host),
            ("homebridge.auth_code", &self.homebridge.auth_code),
            ("homebridge.device", &self.homebridge.device),
            ("mqtt.host", &self.mqtt.host),
            ("mqtt.history_topic", &self.mqtt.history_topic),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                bail!("{field} is required");
            }
        }

        let intervals = [
            ("bridge.poll_interval", self.bridge.poll_interval),
            ("mqtt.reconnect_delay", self.mqtt.reconnect_delay),
        ];
        for (field, value) in intervals {
            if seconds(value).is_none() {
                bail!("{field} must be a positive number of seconds, got {value}");
            }
        }
        if self.bridge.startup_attempts == Some(0) {
            bail!("bridge.startup_attempts must be at least 1");
        }
        Ok(())
    }

    /// Confirmation poll interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        seconds(self.bridge.poll_interval)
            .unwrap_or_else(|| Duration::from_secs_f64(default_poll_interval()))
    }

    /// Settings for the bridge core
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        let target = TargetConfig {
            monitored_key: self.bridge.service.clone(),
            block_name: self.bridge.block_name.clone(),
            device_id: self.homebridge.device.clone(),
        };
        let mut settings =
            BridgeSettings::new(target, &self.mqtt.history_topic, self.poll_interval());
        settings.startup = RetryPolicy {
            max_attempts: self.bridge.startup_attempts,
            ..RetryPolicy::startup()
        };
        settings
    }
}

/// First path that exists on disk
fn first_existing(paths: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    paths.into_iter().find(|path| path.exists())
}

/// Positive seconds that fit in a `Duration`
fn seconds(value: f64) -> Option<Duration> {
    if value > 0.0 {
        Duration::try_from_secs_f64(value).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Config {
        toml::from_str(
            r#"
            [mqtt]
            host = "localhost"

            [homebridge]
            host = "homebridge.local"
            auth_code = "031-45-154"
            device = "Fermenter Heater"

            [bridge]
            service = "spark-one"
            block_name = "Heater Actuator"
            poll_interval = 2.5
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.history_topic, "brewcast/history");
        assert_eq!(config.homebridge.port, 51826);
        assert!((config.bridge.poll_interval - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_and_validate() {
        let config = complete();
        assert!(config.validate().is_ok());
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.poll_interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_missing_field() {
        let mut config = complete();
        config.homebridge.device = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("homebridge.device"));
    }

    #[test]
    fn test_non_positive_poll_interval() {
        let mut config = complete();
        config.bridge.poll_interval = 0.0;
        assert!(config.validate().is_err());
        config.bridge.poll_interval = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_intervals_rejected() {
        let mut config = complete();
        config.bridge.poll_interval = 1e30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bridge.poll_interval"));
        // still usable without validation
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        let _ = config.bridge_settings();

        let mut config = complete();
        config.mqtt.reconnect_delay = f64::INFINITY;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mqtt.reconnect_delay"));
        assert_eq!(config.mqtt.reconnect_after(), Duration::from_secs(5));

        let mut config = complete();
        config.bridge.poll_interval = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_first_existing() {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let found = first_existing([
            PathBuf::from("/nonexistent/brewbridge.toml"),
            manifest.clone(),
        ]);
        assert_eq!(found, Some(manifest));
        assert_eq!(first_existing([PathBuf::from("/nonexistent/a.toml")]), None);
    }

    #[test]
    fn test_bridge_settings() {
        let mut config = complete();
        config.bridge.startup_attempts = Some(4);

        let settings = config.bridge_settings();
        assert_eq!(settings.target.monitored_key, "spark-one");
        assert_eq!(settings.target.block_name, "Heater Actuator");
        assert_eq!(settings.target.device_id, "Fermenter Heater");
        assert_eq!(settings.topic_pattern, "brewcast/history/#");
        assert_eq!(settings.confirm.initial_delay, Duration::from_millis(2500));
        assert_eq!(settings.startup.max_attempts, Some(4));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/brewbridge.toml"));
        assert!(result.is_err());
    }
}
