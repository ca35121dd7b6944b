//! Re-publishes updated records on the bus

use std::sync::Arc;

use tracing::debug;

use crate::bus::MessageBus;
use crate::error::BridgeError;
use crate::record::{StateRecord, encode};

/// Encodes records and sends them back on the topic they came from
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
}

impl Publisher {
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publish `record` on `topic`
    ///
    /// # Errors
    /// `PublishFailure` if the bus rejects the message.
    pub async fn publish(&self, topic: &str, record: &StateRecord) -> Result<(), BridgeError> {
        let payload = encode(record)?;
        let size = payload.len();

        self.bus
            .publish(topic, payload)
            .await
            .map_err(BridgeError::PublishFailure)?;

        debug!(topic, key = %record.key, size, "published record");
        Ok(())
    }
}
