//! brewbridge-core: state reconciliation between a message bus and a hub actuator
//!
//! Decodes block records published on the bus, drives a remote on/off
//! actuator to the desired state, confirms it converged, and republishes the
//! record only when the actuator actually changed. One `BridgeActor` per
//! monitored block keeps reconciliations strictly sequential.

pub mod actor;
pub mod actuator;
pub mod bus;
pub mod config;
pub mod error;
pub mod guard;
pub mod message;
pub mod publisher;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod shutdown;
pub mod state;

pub use actor::{BridgeActor, BridgeActorArgs};
pub use actuator::Actuator;
pub use bus::{BusMessage, ListenerSet, MemoryBus, MessageBus, topic_matches};
pub use config::{BridgeSettings, RetryPolicy, TargetConfig};
pub use error::{ActuationError, ActuatorError, BridgeError, BusError};
pub use guard::{Readiness, StartupGuard};
pub use message::{BridgeStatus, GetStatus, HandleMessage, MessageOutcome};
pub use publisher::Publisher;
pub use reconcile::{Decision, Reconciler, decide};
pub use record::{BlockState, StateRecord, decode, encode};
pub use service::run_bridge;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use state::TriState;
