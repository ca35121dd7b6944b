//! Actor implementations

pub mod bridge;

pub use bridge::{BridgeActor, BridgeActorArgs};
