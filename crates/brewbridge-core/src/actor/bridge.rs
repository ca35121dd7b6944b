//! `BridgeActor`: per-block reconciliation
//!
//! Owns the reconciler for one monitored block. The actor mailbox serializes
//! inbound messages, so a second write never starts before the previous
//! confirmation finished.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::{debug, error, info, warn};

use crate::actuator::Actuator;
use crate::config::{RetryPolicy, TargetConfig};
use crate::error::BridgeError;
use crate::message::{BridgeStatus, GetStatus, HandleMessage, MessageOutcome};
use crate::publisher::Publisher;
use crate::reconcile::Reconciler;
use crate::record::{StateRecord, decode};
use crate::shutdown::Shutdown;
use crate::state::TriState;

/// Arguments for spawning a `BridgeActor`
pub struct BridgeActorArgs {
    /// Followed block and driven device
    pub target: TargetConfig,
    /// Confirmation polling schedule
    pub confirm: RetryPolicy,
    /// Actuator for the device
    pub actuator: Arc<dyn Actuator>,
    /// Publisher for updated records
    pub publisher: Publisher,
    /// Shutdown signal, aborts confirmation polling
    pub shutdown: Shutdown,
    /// Actuator value observed at startup, if any
    pub initial_value: Option<bool>,
}

/// Per-block actor driving one actuator
pub struct BridgeActor {
    reconciler: Reconciler,
    publisher: Publisher,
    shutdown: Shutdown,
    device: String,
    last_state: TriState,
    last_transition: Option<DateTime<Utc>>,
    handled: u64,
    transitions: u64,
    published: u64,
    ignored: u64,
    failures: u64,
    actuation_failures: u64,
    last_error: Option<String>,
}

impl BridgeActor {
    /// Get the monitored block name
    #[must_use]
    pub fn block(&self) -> &str {
        &self.reconciler.target().block_name
    }

    fn record_failure(&mut self, error: &BridgeError) {
        self.failures += 1;
        if error.is_actuation_failure() {
            self.actuation_failures += 1;
        }
        self.last_error = Some(error.to_string());
    }

    fn record_transition(&mut self, record: &StateRecord) {
        self.transitions += 1;
        self.last_transition = Some(Utc::now());
        if let Ok(block) = record.block(&self.reconciler.target().block_name) {
            self.last_state = block.state;
        }
    }

    /// Log and count a message that did not lead to a transition
    fn fail(&mut self, topic: &str, error: BridgeError) -> MessageOutcome {
        match &error {
            BridgeError::BlockNotFound { key, block } => {
                self.ignored += 1;
                if *key == self.reconciler.target().monitored_key {
                    error!(
                        topic,
                        key = %key,
                        block = %block,
                        kind = error.kind(),
                        "monitored block not found in record"
                    );
                } else {
                    // Records of other services share the topic
                    debug!(topic, key = %key, "ignoring record for other key");
                }
            }
            BridgeError::Shutdown => {
                debug!(topic, "dropping message during shutdown");
            }
            BridgeError::MalformedPayload(_) => {
                warn!(topic, kind = error.kind(), error = %error, "dropping malformed message");
                self.record_failure(&error);
            }
            _ if error.is_retryable() => {
                error!(
                    topic,
                    block = %self.block(),
                    device = %self.device,
                    kind = error.kind(),
                    error = %error,
                    "reconciliation failed"
                );
                self.record_failure(&error);
            }
            _ => {
                error!(
                    topic,
                    block = %self.block(),
                    device = %self.device,
                    kind = error.kind(),
                    error = %error,
                    "reconciliation failed, check the hub address, auth code and device name"
                );
                self.record_failure(&error);
            }
        }

        MessageOutcome::Dropped(error)
    }
}

impl Actor for BridgeActor {
    type Args = BridgeActorArgs;
    type Error = BridgeError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(
            block = %args.target.block_name,
            device = %args.target.device_id,
            id = %actor_ref.id(),
            "BridgeActor starting"
        );

        let device = args.target.device_id.clone();
        let last_state = args.initial_value.map_or(TriState::Unknown, TriState::from);

        Ok(Self {
            reconciler: Reconciler::new(
                args.target,
                args.confirm,
                args.actuator,
                args.shutdown.clone(),
            ),
            publisher: args.publisher,
            shutdown: args.shutdown,
            device,
            last_state,
            last_transition: None,
            handled: 0,
            transitions: 0,
            published: 0,
            ignored: 0,
            failures: 0,
            actuation_failures: 0,
            last_error: None,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(
            block = %self.block(),
            reason = ?reason,
            handled = self.handled,
            transitions = self.transitions,
            "BridgeActor stopping"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<HandleMessage> for BridgeActor {
    type Reply = MessageOutcome;

    async fn handle(
        &mut self,
        msg: HandleMessage,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handled += 1;

        if self.shutdown.is_triggered() {
            return self.fail(&msg.topic, BridgeError::Shutdown);
        }

        let record = match decode(&msg.payload) {
            Ok(record) => record,
            Err(e) => return self.fail(&msg.topic, e),
        };

        let updated = match self.reconciler.reconcile(record).await {
            Ok(Some(updated)) => updated,
            Ok(None) => return MessageOutcome::Unchanged,
            Err(e) => return self.fail(&msg.topic, e),
        };

        self.record_transition(&updated);

        // The actuation stands even if the notification is lost
        match self.publisher.publish(&msg.topic, &updated).await {
            Ok(()) => {
                self.published += 1;
                MessageOutcome::Published(updated)
            }
            Err(e) => {
                error!(
                    topic = %msg.topic,
                    block = %self.block(),
                    kind = e.kind(),
                    error = %e,
                    "failed to publish updated record"
                );
                self.record_failure(&e);
                MessageOutcome::Unpublished {
                    record: updated,
                    error: e,
                }
            }
        }
    }
}

impl Message<GetStatus> for BridgeActor {
    type Reply = BridgeStatus;

    async fn handle(
        &mut self,
        _msg: GetStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        BridgeStatus {
            block: self.block().to_string(),
            device: self.device.clone(),
            last_state: self.last_state,
            last_transition: self.last_transition,
            handled: self.handled,
            transitions: self.transitions,
            published: self.published,
            ignored: self.ignored,
            failures: self.failures,
            actuation_failures: self.actuation_failures,
            last_error: self.last_error.clone(),
        }
    }
}
