//! Configuration types for the bridge core

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Which record/block this bridge follows and which hub device it drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Record `key` to follow (the Brewblox service name)
    pub monitored_key: String,
    /// Block name inside the record's `data`
    pub block_name: String,
    /// Hub device name the block maps to
    pub device_id: String,
}

impl TargetConfig {
    /// Reject empty identifiers
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first empty field.
    pub fn validate(&self) -> Result<(), BridgeError> {
        for (field, value) in [
            ("monitored_key", &self.monitored_key),
            ("block_name", &self.block_name),
            ("device_id", &self.device_id),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::ConfigError(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Retry schedule with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    #[serde(with = "secs_f64")]
    pub initial_delay: Duration,
    /// Factor applied to the delay after each attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound for a single delay
    #[serde(with = "secs_f64")]
    pub max_delay: Duration,
    /// Give up after this many attempts (`None` retries forever)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_multiplier() -> f64 {
    2.0
}

impl RetryPolicy {
    /// Constant delay, bounded attempts
    #[must_use]
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts,
        }
    }

    /// Confirmation polling after a write
    #[must_use]
    pub fn confirmation(poll_interval: Duration) -> Self {
        Self {
            initial_delay: poll_interval,
            multiplier: 1.5,
            max_delay: poll_interval.saturating_mul(5),
            max_attempts: Some(10),
        }
    }

    /// Startup guard: retries until ready
    #[must_use]
    pub fn startup() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.multiplier.max(1.0).powi(i32::try_from(exponent).unwrap_or(32));
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay.max(self.initial_delay)
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::confirmation(Duration::from_secs(1))
    }
}

/// Everything the bridge core needs besides its collaborators
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Followed block and driven device
    pub target: TargetConfig,
    /// Topic pattern to subscribe to, e.g. `brewcast/history/#`
    pub topic_pattern: String,
    /// Polling schedule after a write
    pub confirm: RetryPolicy,
    /// Retry schedule until the bridge is ready
    pub startup: RetryPolicy,
}

impl BridgeSettings {
    /// Settings with default policies for `target` on `topic_prefix/#`
    #[must_use]
    pub fn new(target: TargetConfig, topic_prefix: &str, poll_interval: Duration) -> Self {
        Self {
            target,
            topic_pattern: format!("{}/#", topic_prefix.trim_end_matches('/')),
            confirm: RetryPolicy::confirmation(poll_interval),
            startup: RetryPolicy::startup(),
        }
    }
}

mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
