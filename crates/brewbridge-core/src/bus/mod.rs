//! Publish/subscribe bus abstraction
//!
//! The bridge consumes the bus through [`MessageBus`]. [`ListenerSet`] is the
//! shared fan-out used by concrete transports to hand inbound messages to the
//! listeners registered with [`MessageBus::listen`].

pub mod memory;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::error::BusError;

pub use memory::MemoryBus;

/// A message received from or sent to the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message bus consumed by the bridge
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Ask the broker to deliver messages matching `pattern`
    async fn subscribe(&self, pattern: &str) -> Result<(), BusError>;

    /// Undo [`MessageBus::subscribe`]
    async fn unsubscribe(&self, pattern: &str) -> Result<(), BusError>;

    /// Register a local listener for messages matching `pattern`
    ///
    /// The channel is unbounded: a slow consumer queues messages instead of
    /// stalling the transport that delivers them.
    async fn listen(
        &self,
        pattern: &str,
    ) -> Result<mpsc::UnboundedReceiver<BusMessage>, BusError>;

    /// Drop every listener registered for `pattern`
    async fn unlisten(&self, pattern: &str) -> Result<(), BusError>;

    /// Send `payload` on `topic`
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// MQTT topic filter matching with `+` and `#` wildcards
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut filter = pattern.split('/');
    let mut levels = topic.split('/');

    loop {
        match (filter.next(), levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Listener registry with wildcard fan-out
#[derive(Debug, Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<(String, mpsc::UnboundedSender<BusMessage>)>>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its receiving end
    pub async fn add(&self, pattern: &str) -> mpsc::UnboundedReceiver<BusMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().await.push((pattern.to_string(), tx));
        rx
    }

    /// Remove all listeners for `pattern`, returns how many were removed
    pub async fn remove(&self, pattern: &str) -> usize {
        let mut listeners = self.listeners.lock().await;
        let before = listeners.len();
        listeners.retain(|(p, _)| p != pattern);
        before - listeners.len()
    }

    /// Deliver `message` to every matching listener
    ///
    /// Never waits on a listener, so the caller (a transport event loop) keeps
    /// running while consumers are busy. Per-listener order is arrival order.
    /// Listeners whose receiver was dropped are pruned. Returns the number of
    /// listeners that accepted the message.
    pub async fn dispatch(&self, message: &BusMessage) -> usize {
        let mut listeners = self.listeners.lock().await;

        let mut delivered = 0;
        listeners.retain(|(pattern, tx)| {
            if !topic_matches(pattern, &message.topic) {
                return !tx.is_closed();
            }
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(topic = %message.topic, "dropping closed listener");
                false
            }
        });
        delivered
    }

    pub async fn len(&self) -> usize {
        self.listeners.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
