//! `HubActuator`: one named Homebridge switch behind the `Actuator` trait

use async_trait::async_trait;
use brewbridge_core::{Actuator, ActuatorError};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{HubError, Result};
use crate::http::HubClient;
use crate::types::{SwitchHandle, find_switch, value_as_bool};

/// On/off actuator for the hub device called `device`
///
/// The characteristic location is discovered on first use and cached; any
/// failed call drops the cache so the next call rediscovers.
#[derive(Debug)]
pub struct HubActuator {
    client: HubClient,
    device: String,
    session: Mutex<Option<SwitchHandle>>,
}

impl HubActuator {
    #[must_use]
    pub fn new(client: HubClient, device: impl Into<String>) -> Self {
        Self {
            client,
            device: device.into(),
            session: Mutex::new(None),
        }
    }

    async fn discover(&self) -> Result<SwitchHandle> {
        let accessories = self.client.accessories().await?;
        let handle = find_switch(&accessories, &self.device)
            .ok_or_else(|| HubError::DeviceNotFound(self.device.clone()))?;
        info!(
            device = %self.device,
            aid = handle.aid,
            iid = handle.iid,
            "discovered hub device"
        );
        Ok(handle)
    }

    /// Get the device value
    ///
    /// With `force_refresh` unset a value cached from discovery or a previous
    /// read is returned without a round trip.
    ///
    /// # Errors
    /// Returns an error if the device cannot be found or read.
    pub async fn get_value(&self, force_refresh: bool) -> Result<bool> {
        let mut session = self.session.lock().await;

        let handle = match session.take() {
            Some(handle) => handle,
            None => self.discover().await?,
        };

        if !force_refresh && let Some(value) = handle.cached {
            *session = Some(handle);
            return Ok(value);
        }

        let raw = self
            .client
            .read_characteristic(handle.aid, handle.iid)
            .await?;
        let value = value_as_bool(&raw).ok_or_else(|| {
            HubError::InvalidResponse(format!("non-boolean value for {}: {raw}", self.device))
        })?;

        debug!(device = %self.device, value, "read hub device");
        *session = Some(SwitchHandle {
            cached: Some(value),
            ..handle
        });
        Ok(value)
    }

    /// Set the device value
    ///
    /// # Errors
    /// Returns an error if the device cannot be found or written.
    pub async fn set_value(&self, value: bool) -> Result<()> {
        let mut session = self.session.lock().await;

        let handle = match session.take() {
            Some(handle) => handle,
            None => self.discover().await?,
        };

        self.client
            .write_characteristic(handle.aid, handle.iid, Value::Bool(value))
            .await?;

        debug!(device = %self.device, value, "wrote hub device");
        // Accepted is not applied; the next read goes to the hub
        *session = Some(SwitchHandle {
            cached: None,
            ..handle
        });
        Ok(())
    }

    fn log_failure(&self, operation: &str, e: &HubError) {
        if e.is_retryable() {
            warn!(device = %self.device, operation, error = %e, "hub call failed");
        } else {
            error!(
                device = %self.device,
                operation,
                error = %e,
                "hub call failed, will not succeed without a configuration change"
            );
        }
    }
}

#[async_trait]
impl Actuator for HubActuator {
    async fn read(&self, force_refresh: bool) -> std::result::Result<bool, ActuatorError> {
        self.get_value(force_refresh).await.map_err(|e| {
            self.log_failure("read", &e);
            ActuatorError::from(e)
        })
    }

    async fn write(&self, value: bool) -> std::result::Result<(), ActuatorError> {
        self.set_value(value).await.map_err(|e| {
            self.log_failure("write", &e);
            ActuatorError::from(e)
        })
    }

    fn device_id(&self) -> &str {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_hub_is_connect_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = HubClient::from_host("127.0.0.1", 9, "031-45-154").unwrap();
        let actuator = HubActuator::new(client, "Pump");

        assert_eq!(actuator.device_id(), "Pump");

        let err = actuator.read(true).await.unwrap_err();
        assert!(matches!(err, ActuatorError::Connect(_)));
        assert!(actuator.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_hub_is_retried_by_callers() {
        let client = HubClient::from_host("127.0.0.1", 9, "031-45-154").unwrap();
        let actuator = HubActuator::new(client, "Pump");

        let err = actuator.set_value(true).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
        assert!(ActuatorError::from(err).is_retryable());
    }
}
