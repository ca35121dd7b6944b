//! Startup guard: retry until the bus and the actuator are both reachable

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::actuator::Actuator;
use crate::bus::{BusMessage, MessageBus};
use crate::config::RetryPolicy;
use crate::error::BridgeError;
use crate::shutdown::Shutdown;

/// States of the startup guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Pending,
    Ready,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardState::Pending => write!(f, "pending"),
            GuardState::Ready => write!(f, "ready"),
        }
    }
}

/// Result of a successful startup
#[derive(Debug)]
pub struct Readiness {
    /// Listener registered on the topic pattern
    pub listener: mpsc::UnboundedReceiver<BusMessage>,
    /// Actuator value read during startup
    pub initial_value: bool,
    /// Attempts it took to become ready
    pub attempts: u32,
}

/// Retries listener registration, subscription and one forced actuator read
/// until all three succeed in the same attempt
pub struct StartupGuard {
    bus: Arc<dyn MessageBus>,
    actuator: Arc<dyn Actuator>,
    topic_pattern: String,
    policy: RetryPolicy,
    state: GuardState,
}

impl StartupGuard {
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus>,
        actuator: Arc<dyn Actuator>,
        topic_pattern: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            bus,
            actuator,
            topic_pattern: topic_pattern.into(),
            policy,
            state: GuardState::Pending,
        }
    }

    /// Run attempts until ready
    ///
    /// # Errors
    /// `Shutdown` if shutdown fires while pending, `StartupExhausted` if the
    /// policy allows a bounded number of attempts and all of them failed.
    pub async fn run(mut self, shutdown: &Shutdown) -> Result<Readiness, BridgeError> {
        let mut shutdown = shutdown.clone();
        let mut attempt = 0;

        loop {
            if shutdown.is_triggered() {
                return Err(BridgeError::Shutdown);
            }

            attempt += 1;
            match self.attempt().await {
                Ok((listener, initial_value)) => {
                    self.transition_to(GuardState::Ready, attempt);
                    return Ok(Readiness {
                        listener,
                        initial_value,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        attempt,
                        kind = e.kind(),
                        error = %e,
                        device = %self.actuator.device_id(),
                        "startup attempt failed"
                    );
                }
                // Keeps retrying: the device may still be added on the hub
                Err(e) => {
                    error!(
                        attempt,
                        kind = e.kind(),
                        error = %e,
                        device = %self.actuator.device_id(),
                        "startup attempt failed, check the hub address, auth code and device name"
                    );
                }
            }

            if !self.policy.allows(attempt) {
                return Err(BridgeError::StartupExhausted { attempts: attempt });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(attempt, delay = ?delay, "retrying startup");
            if shutdown.sleep(delay).await {
                return Err(BridgeError::Shutdown);
            }
        }
    }

    async fn attempt(
        &self,
    ) -> Result<(mpsc::UnboundedReceiver<BusMessage>, bool), BridgeError> {
        let listener = self
            .bus
            .listen(&self.topic_pattern)
            .await
            .map_err(BridgeError::Subscribe)?;

        let ready = async {
            self.bus
                .subscribe(&self.topic_pattern)
                .await
                .map_err(BridgeError::Subscribe)?;
            self.actuator
                .read(true)
                .await
                .map_err(BridgeError::ActuatorConnect)
        }
        .await;

        match ready {
            Ok(value) => Ok((listener, value)),
            Err(e) => {
                drop(listener);
                // Next attempt registers a fresh listener
                if let Err(unlisten) = self.bus.unlisten(&self.topic_pattern).await {
                    warn!(error = %unlisten, "failed to drop listener after failed attempt");
                }
                Err(e)
            }
        }
    }

    fn transition_to(&mut self, new_state: GuardState, attempts: u32) {
        let old_state = self.state;
        self.state = new_state;
        info!(
            from = %old_state,
            to = %new_state,
            attempts,
            topic = %self.topic_pattern,
            "startup state transition"
        );
    }
}
