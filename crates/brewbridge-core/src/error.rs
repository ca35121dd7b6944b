//! Core error types for brewbridge-core

use thiserror::Error;

/// Errors reported by an [`Actuator`](crate::actuator::Actuator) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// Could not reach the hub
    #[error("hub connection failed: {0}")]
    Connect(String),

    /// The hub answered with an error status
    #[error("hub returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body from the hub
        message: String,
    },

    /// The configured device does not exist on the hub
    #[error("device not found on hub: {0}")]
    DeviceNotFound(String),

    /// The hub answered with something we could not interpret
    #[error("invalid hub response: {0}")]
    InvalidResponse(String),
}

impl ActuatorError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ActuatorError::Connect(_) => true,
            ActuatorError::Api { status, .. } => *status >= 500,
            ActuatorError::DeviceNotFound(_) | ActuatorError::InvalidResponse(_) => false,
        }
    }
}

/// Errors reported by a [`MessageBus`](crate::bus::MessageBus) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Subscription could not be registered with the broker
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe {
        /// Topic pattern
        topic: String,
        /// Transport error
        reason: String,
    },

    /// Publishing a payload failed
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Destination topic
        topic: String,
        /// Transport error
        reason: String,
    },

    /// The bus connection is gone
    #[error("bus closed")]
    Closed,
}

/// Why an actuation did not reach the desired state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuationError {
    /// The write itself failed
    #[error("write failed: {0}")]
    Write(ActuatorError),

    /// A confirmation read failed
    #[error("confirmation read failed: {0}")]
    Confirm(ActuatorError),

    /// The actuator never reported the target value
    #[error("actuator did not reach {target} after {attempts} reads")]
    NotConverged {
        /// Target value that was written
        target: bool,
        /// Confirmation reads performed
        attempts: u32,
    },

    /// Shutdown was requested while confirming
    #[error("cancelled by shutdown")]
    Cancelled,
}

/// Errors that can occur while bridging bus records to the hub
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Payload is not JSON or lacks `key`/`data`
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Monitored block absent from an otherwise valid record
    #[error("block {block} not found for key {key}")]
    BlockNotFound {
        /// Key of the record that was inspected
        key: String,
        /// Block name that was expected
        block: String,
    },

    /// Live actuator read failed outside of a confirmation poll
    #[error("actuator unavailable: {0}")]
    ActuatorConnect(ActuatorError),

    /// Write or confirmation failed, state left as last known
    #[error("actuation failed: {0}")]
    ActuationFailure(ActuationError),

    /// Updated record could not be published
    #[error("publish failed: {0}")]
    PublishFailure(BusError),

    /// Listener or subscription registration failed
    #[error("subscription failed: {0}")]
    Subscribe(BusError),

    /// Startup guard gave up
    #[error("startup gave up after {attempts} attempts")]
    StartupExhausted {
        /// Attempts performed
        attempts: u32,
    },

    /// Shutdown was requested before the operation finished
    #[error("shutdown requested")]
    Shutdown,

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl BridgeError {
    /// Whether the error came from driving the actuator
    #[must_use]
    pub fn is_actuation_failure(&self) -> bool {
        matches!(self, BridgeError::ActuationFailure(_))
    }

    /// Whether trying again can succeed without a configuration change
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::ActuatorConnect(e)
            | BridgeError::ActuationFailure(
                ActuationError::Write(e) | ActuationError::Confirm(e),
            ) => e.is_retryable(),
            BridgeError::ActuationFailure(
                ActuationError::NotConverged { .. } | ActuationError::Cancelled,
            )
            | BridgeError::PublishFailure(_)
            | BridgeError::Subscribe(_) => true,
            BridgeError::MalformedPayload(_)
            | BridgeError::BlockNotFound { .. }
            | BridgeError::StartupExhausted { .. }
            | BridgeError::Shutdown
            | BridgeError::ActorError(_)
            | BridgeError::ConfigError(_) => false,
        }
    }

    /// Short name used as a structured log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::MalformedPayload(_) => "malformed_payload",
            BridgeError::BlockNotFound { .. } => "block_not_found",
            BridgeError::ActuatorConnect(_) => "actuator_connect",
            BridgeError::ActuationFailure(_) => "actuation_failure",
            BridgeError::PublishFailure(_) => "publish_failure",
            BridgeError::Subscribe(_) => "subscribe",
            BridgeError::StartupExhausted { .. } => "startup_exhausted",
            BridgeError::Shutdown => "shutdown",
            BridgeError::ActorError(_) => "actor",
            BridgeError::ConfigError(_) => "config",
        }
    }
}
