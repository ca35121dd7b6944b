//! Error types for the hub client

use brewbridge_core::ActuatorError;
use thiserror::Error;

/// Errors that can occur when talking to the hub
#[derive(Error, Debug)]
pub enum HubError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Hub returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the hub
        message: String,
    },

    /// Hub accepted the request but reported a HAP status for a characteristic
    #[error("characteristic {aid}.{iid} reported HAP status {status}")]
    Hap {
        /// Accessory id
        aid: u64,
        /// Characteristic instance id
        iid: u64,
        /// HAP status code
        status: i64,
    },

    /// No accessory with a matching name and an `On` characteristic
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl HubError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            HubError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            HubError::Api { status, .. } => *status >= 500,
            HubError::Hap { .. } => true,
            _ => false,
        }
    }
}

impl From<HubError> for ActuatorError {
    fn from(error: HubError) -> Self {
        match error {
            HubError::Http(e) => ActuatorError::Connect(e.to_string()),
            HubError::Api { status, message } => ActuatorError::Api { status, message },
            // e.g. -70402, the bridged device did not answer
            e @ HubError::Hap { .. } => ActuatorError::Connect(e.to_string()),
            HubError::DeviceNotFound(name) => ActuatorError::DeviceNotFound(name),
            e @ (HubError::Json(_) | HubError::Url(_) | HubError::InvalidResponse(_)) => {
                ActuatorError::InvalidResponse(e.to_string())
            }
        }
    }
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuator_error_mapping() {
        let err: ActuatorError = HubError::Api {
            status: 470,
            message: "unauthorized".to_string(),
        }
        .into();
        assert_eq!(
            err,
            ActuatorError::Api {
                status: 470,
                message: "unauthorized".to_string()
            }
        );

        let err: ActuatorError = HubError::Hap {
            aid: 2,
            iid: 10,
            status: -70402,
        }
        .into();
        assert!(err.is_retryable());

        let err: ActuatorError = HubError::DeviceNotFound("Pump".to_string()).into();
        assert_eq!(err, ActuatorError::DeviceNotFound("Pump".to_string()));
    }

    #[test]
    fn test_retryable() {
        assert!(
            HubError::Api {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!HubError::InvalidResponse("x".to_string()).is_retryable());
        assert!(!HubError::DeviceNotFound("Pump".to_string()).is_retryable());
    }
}
