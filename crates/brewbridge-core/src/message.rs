//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use chrono::{DateTime, Utc};
use kameo_macros::Reply;

use crate::bus::BusMessage;
use crate::error::BridgeError;
use crate::record::StateRecord;
use crate::state::TriState;

// ============================================================================
// BridgeActor Messages
// ============================================================================

/// Handle one inbound bus message
#[derive(Debug)]
pub struct HandleMessage {
    /// Topic the message arrived on, reused for the republish
    pub topic: String,
    /// Raw payload
    pub payload: Vec<u8>,
}

impl From<BusMessage> for HandleMessage {
    fn from(message: BusMessage) -> Self {
        Self {
            topic: message.topic,
            payload: message.payload,
        }
    }
}

/// What happened to a handled message
///
/// Failures are carried as data so a message sent with `tell` never stops the
/// actor.
#[derive(Debug, Clone, Reply)]
pub enum MessageOutcome {
    /// Actuator changed and the updated record was published
    Published(StateRecord),
    /// Actuator changed but publishing failed
    Unpublished {
        /// Record that should have been published
        record: StateRecord,
        /// Publish error
        error: BridgeError,
    },
    /// Nothing to do
    Unchanged,
    /// Message dropped before or during actuation
    Dropped(BridgeError),
}

impl MessageOutcome {
    /// Record that reflects an actuator change, if any
    #[must_use]
    pub fn changed_record(&self) -> Option<&StateRecord> {
        match self {
            MessageOutcome::Published(record) | MessageOutcome::Unpublished { record, .. } => {
                Some(record)
            }
            MessageOutcome::Unchanged | MessageOutcome::Dropped(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            MessageOutcome::Unpublished { error, .. } | MessageOutcome::Dropped(error) => {
                Some(error)
            }
            MessageOutcome::Published(_) | MessageOutcome::Unchanged => None,
        }
    }
}

/// Get the bridge status
#[derive(Debug)]
pub struct GetStatus;

/// Bridge status response
#[derive(Debug, Clone, Reply)]
pub struct BridgeStatus {
    /// Monitored block
    pub block: String,
    /// Driven hub device
    pub device: String,
    /// Last state this bridge confirmed on the actuator
    pub last_state: TriState,
    /// When `last_state` was confirmed
    pub last_transition: Option<DateTime<Utc>>,
    /// Messages handled
    pub handled: u64,
    /// Messages that changed the actuator
    pub transitions: u64,
    /// Updated records published
    pub published: u64,
    /// Messages for other keys or without the block
    pub ignored: u64,
    /// Messages that failed
    pub failures: u64,
    /// Failures while writing or confirming, a subset of `failures`
    pub actuation_failures: u64,
    /// Most recent error
    pub last_error: Option<String>,
}
