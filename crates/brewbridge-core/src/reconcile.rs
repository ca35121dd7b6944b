//! Reconciliation of a block record against the live actuator
//!
//! Given a decoded record, decide whether the actuator must be driven, drive
//! it, poll until it reports the requested value, and hand back the updated
//! record. A record is only returned when this call changed the actuator.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::actuator::Actuator;
use crate::config::{RetryPolicy, TargetConfig};
use crate::error::{ActuationError, BridgeError};
use crate::record::{BlockState, StateRecord};
use crate::shutdown::Shutdown;
use crate::state::TriState;

/// What to do about a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Desired state is unknown, nothing to act on
    Skip,
    /// Live actuator value already matches the desired state
    InSync,
    /// Write `target` and confirm it
    Drive { target: bool },
}

/// Decide on an action from the block and the live actuator value
///
/// An unknown recorded state always drives. Otherwise the live value decides:
/// a stale recorded state whose live value already matches is left alone, and
/// a missing live value drives.
#[must_use]
pub fn decide(block: &BlockState, live: Option<bool>) -> Decision {
    let Some(target) = block.desired_state.as_bool() else {
        return Decision::Skip;
    };

    if !block.state.is_known() {
        return Decision::Drive { target };
    }

    match live {
        Some(value) if value == target => Decision::InSync,
        _ => Decision::Drive { target },
    }
}

/// Whether [`decide`] needs a live read for this block
#[must_use]
pub fn needs_live_read(block: &BlockState) -> bool {
    block.desired_state.is_known() && block.state.is_known()
}

/// Drives one actuator to match one block
pub struct Reconciler {
    target: TargetConfig,
    confirm: RetryPolicy,
    actuator: Arc<dyn Actuator>,
    shutdown: Shutdown,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        target: TargetConfig,
        confirm: RetryPolicy,
        actuator: Arc<dyn Actuator>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            target,
            confirm,
            actuator,
            shutdown,
        }
    }

    #[must_use]
    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Reconcile `record`; `Some` carries the updated record to publish
    ///
    /// # Errors
    /// - `BlockNotFound` if the record is for another key or lacks the block
    /// - `MalformedPayload` if the block is not a binary block
    /// - `ActuatorConnect` if the drift-check read fails
    /// - `ActuationFailure` if the write or its confirmation fails
    pub async fn reconcile(
        &self,
        mut record: StateRecord,
    ) -> Result<Option<StateRecord>, BridgeError> {
        if record.key != self.target.monitored_key {
            return Err(BridgeError::BlockNotFound {
                key: record.key,
                block: self.target.block_name.clone(),
            });
        }

        let block = record.block(&self.target.block_name)?;
        let decision = self.evaluate(&block).await?;

        let target = match decision {
            Decision::Skip => {
                debug!(block = %self.target.block_name, "desired state unknown, skipping");
                return Ok(None);
            }
            Decision::InSync => {
                debug!(
                    block = %self.target.block_name,
                    state = %block.state,
                    "actuator already in desired state"
                );
                return Ok(None);
            }
            Decision::Drive { target } => target,
        };

        info!(
            block = %self.target.block_name,
            device = %self.actuator.device_id(),
            from = %block.state,
            to = %TriState::from(target),
            "driving actuator"
        );

        let attempts = self
            .drive(target)
            .await
            .map_err(BridgeError::ActuationFailure)?;

        record.set_block_state(&self.target.block_name, TriState::from(target))?;

        info!(
            block = %self.target.block_name,
            device = %self.actuator.device_id(),
            state = %TriState::from(target),
            attempts,
            "actuator converged"
        );

        Ok(Some(record))
    }

    /// Decide, reading the actuator with a forced refresh when needed
    async fn evaluate(&self, block: &BlockState) -> Result<Decision, BridgeError> {
        if !needs_live_read(block) {
            return Ok(decide(block, None));
        }

        let live = self
            .actuator
            .read(true)
            .await
            .map_err(BridgeError::ActuatorConnect)?;

        let decision = decide(block, Some(live));
        let recorded = block.state.as_bool();
        match decision {
            Decision::Drive { target } if recorded == Some(target) => warn!(
                block = %self.target.block_name,
                device = %self.actuator.device_id(),
                recorded = %block.state,
                live,
                "actuator drifted from recorded state"
            ),
            Decision::InSync if recorded != Some(live) => debug!(
                block = %self.target.block_name,
                recorded = %block.state,
                live,
                "recorded state is stale, actuator already matches"
            ),
            _ => {}
        }
        Ok(decision)
    }

    /// Write `target` and wait until the actuator reports it
    ///
    /// Returns the number of confirmation reads.
    async fn drive(&self, target: bool) -> Result<u32, ActuationError> {
        self.actuator
            .write(target)
            .await
            .map_err(ActuationError::Write)?;

        self.confirm(target).await
    }

    async fn confirm(&self, target: bool) -> Result<u32, ActuationError> {
        let mut shutdown = self.shutdown.clone();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let value = self
                .actuator
                .read(true)
                .await
                .map_err(ActuationError::Confirm)?;
            if value == target {
                return Ok(attempt);
            }

            if !self.confirm.allows(attempt) {
                return Err(ActuationError::NotConverged {
                    target,
                    attempts: attempt,
                });
            }

            let delay = self.confirm.delay_after(attempt);
            debug!(
                device = %self.actuator.device_id(),
                attempt,
                delay = ?delay,
                "waiting for actuator to converge"
            );

            if shutdown.sleep(delay).await {
                return Err(ActuationError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(desired: TriState, state: TriState) -> BlockState {
        BlockState::new(desired, state)
    }

    #[test]
    fn test_decide_unknown_state_always_drives() {
        assert_eq!(
            decide(&block(TriState::On, TriState::Unknown), Some(true)),
            Decision::Drive { target: true }
        );
        assert_eq!(
            decide(&block(TriState::Off, TriState::Unknown), Some(false)),
            Decision::Drive { target: false }
        );
        assert!(!needs_live_read(&block(TriState::On, TriState::Unknown)));
    }

    #[test]
    fn test_decide_follows_live_value() {
        assert_eq!(
            decide(&block(TriState::On, TriState::Off), Some(false)),
            Decision::Drive { target: true }
        );
        assert_eq!(
            decide(&block(TriState::Off, TriState::Off), Some(true)),
            Decision::Drive { target: false }
        );
        assert!(needs_live_read(&block(TriState::On, TriState::Off)));
    }

    #[test]
    fn test_decide_stale_state_with_matching_live_is_in_sync() {
        assert_eq!(
            decide(&block(TriState::On, TriState::Off), Some(true)),
            Decision::InSync
        );
        assert_eq!(
            decide(&block(TriState::Off, TriState::Off), Some(false)),
            Decision::InSync
        );
    }

    #[test]
    fn test_decide_skip_and_missing_live() {
        assert_eq!(
            decide(&block(TriState::Unknown, TriState::On), Some(false)),
            Decision::Skip
        );
        assert!(!needs_live_read(&block(TriState::Unknown, TriState::On)));
        assert_eq!(
            decide(&block(TriState::On, TriState::On), None),
            Decision::Drive { target: true }
        );
    }
}
