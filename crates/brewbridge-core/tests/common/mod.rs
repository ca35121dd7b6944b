#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use brewbridge_core::{Actuator, ActuatorError, RetryPolicy, TargetConfig};

pub const TOPIC: &str = "brewcast/history/svc1";
pub const PATTERN: &str = "brewcast/history/#";

pub fn target() -> TargetConfig {
    TargetConfig {
        monitored_key: "svc1".to_string(),
        block_name: "pump".to_string(),
        device_id: "Pump".to_string(),
    }
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1), Some(max_attempts))
}

pub fn payload(desired: &str, state: &str) -> Vec<u8> {
    format!(r#"{{"key":"svc1","data":{{"pump":{{"desiredState":{desired},"state":{state}}}}}}}"#)
        .into_bytes()
}

#[derive(Default)]
struct Inner {
    value: bool,
    pending: Option<bool>,
    lag: u32,
    remaining_lag: u32,
    stuck: bool,
    fail_writes: bool,
    failing_reads: u32,
    missing: bool,
    writes: Vec<bool>,
    reads: u32,
    overlapping_writes: u32,
}

/// Actuator double: a write takes effect after `lag` confirmation reads
pub struct MockActuator {
    inner: Mutex<Inner>,
    read_delay: Duration,
}

impl MockActuator {
    pub fn new(value: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value,
                ..Inner::default()
            }),
            read_delay: Duration::ZERO,
        }
    }

    pub fn with_lag(self, lag: u32) -> Self {
        self.inner.lock().unwrap().lag = lag;
        self
    }

    /// Writes are accepted but never take effect
    pub fn stuck(self) -> Self {
        self.inner.lock().unwrap().stuck = true;
        self
    }

    /// The hub does not know the device
    pub fn missing(self) -> Self {
        self.inner.lock().unwrap().missing = true;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.inner.lock().unwrap().failing_reads = count;
    }

    /// Manual override at the hub
    pub fn set_value(&self, value: bool) {
        self.inner.lock().unwrap().value = value;
    }

    pub fn value(&self) -> bool {
        self.inner.lock().unwrap().value
    }

    pub fn writes(&self) -> Vec<bool> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn reads(&self) -> u32 {
        self.inner.lock().unwrap().reads
    }

    pub fn overlapping_writes(&self) -> u32 {
        self.inner.lock().unwrap().overlapping_writes
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn read(&self, _force_refresh: bool) -> Result<bool, ActuatorError> {
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;

        if inner.missing {
            return Err(ActuatorError::DeviceNotFound("Pump".to_string()));
        }

        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(ActuatorError::Connect("connection reset".to_string()));
        }

        if let Some(target) = inner.pending
            && !inner.stuck
        {
            if inner.remaining_lag == 0 {
                inner.value = target;
                inner.pending = None;
            } else {
                inner.remaining_lag -= 1;
            }
        }

        Ok(inner.value)
    }

    async fn write(&self, value: bool) -> Result<(), ActuatorError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_writes {
            return Err(ActuatorError::Connect("connection refused".to_string()));
        }

        if inner.pending.is_some() && !inner.stuck {
            inner.overlapping_writes += 1;
        }

        inner.writes.push(value);
        inner.pending = Some(value);
        inner.remaining_lag = inner.lag;
        Ok(())
    }

    fn device_id(&self) -> &str {
        "Pump"
    }
}

pub fn shared(actuator: MockActuator) -> Arc<MockActuator> {
    Arc::new(actuator)
}
