//! Binary actuator trait

use async_trait::async_trait;

use crate::error::ActuatorError;

/// A single remote on/off device
///
/// Implementations own their connection and must recover from transient
/// failures on the next call without being rebuilt.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Current value; `force_refresh` bypasses any cached state
    async fn read(&self, force_refresh: bool) -> Result<bool, ActuatorError>;

    /// Request a new value
    async fn write(&self, value: bool) -> Result<(), ActuatorError>;

    /// Device name used in logs
    fn device_id(&self) -> &str;
}
