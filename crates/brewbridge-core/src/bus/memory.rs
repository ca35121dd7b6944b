//! In-process message bus
//!
//! Behaves like a broker with a single client: published messages are
//! delivered to local listeners only if a matching subscription exists.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::bus::{BusMessage, ListenerSet, MessageBus, topic_matches};
use crate::error::BusError;

/// Loopback bus used for tests and local runs
#[derive(Debug, Default)]
pub struct MemoryBus {
    subscriptions: Mutex<HashSet<String>>,
    listeners: ListenerSet,
    published: Mutex<Vec<BusMessage>>,
    subscribe_failures: AtomicU32,
    fail_publish: AtomicBool,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` subscribe calls fail
    pub fn fail_next_subscribes(&self, count: u32) {
        self.subscribe_failures.store(count, Ordering::SeqCst);
    }

    /// Make every publish fail until reset
    pub fn set_publish_failing(&self, failing: bool) {
        self.fail_publish.store(failing, Ordering::SeqCst);
    }

    /// Every message successfully published so far
    pub async fn published(&self) -> Vec<BusMessage> {
        self.published.lock().await.clone()
    }

    /// Current subscription patterns
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.iter().cloned().collect()
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.len().await
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, pattern: &str) -> Result<(), BusError> {
        let remaining = self.subscribe_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.subscribe_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BusError::Subscribe {
                topic: pattern.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        self.subscriptions.lock().await.insert(pattern.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, pattern: &str) -> Result<(), BusError> {
        self.subscriptions.lock().await.remove(pattern);
        Ok(())
    }

    async fn listen(
        &self,
        pattern: &str,
    ) -> Result<mpsc::UnboundedReceiver<BusMessage>, BusError> {
        Ok(self.listeners.add(pattern).await)
    }

    async fn unlisten(&self, pattern: &str) -> Result<(), BusError> {
        self.listeners.remove(pattern).await;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let message = BusMessage::new(topic, payload);
        self.published.lock().await.push(message.clone());

        let subscribed = self
            .subscriptions
            .lock()
            .await
            .iter()
            .any(|pattern| topic_matches(pattern, topic));

        if subscribed {
            let delivered = self.listeners.dispatch(&message).await;
            debug!(topic, delivered, "memory bus delivered message");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_requires_subscription() {
        let bus = MemoryBus::new();
        let mut rx = bus.listen("brewcast/history/#").await.unwrap();

        bus.publish("brewcast/history/spark", b"one".to_vec())
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        bus.subscribe("brewcast/history/#").await.unwrap();
        bus.publish("brewcast/history/spark", b"two".to_vec())
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, b"two".to_vec());
        assert_eq!(bus.published().await.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let bus = MemoryBus::new();
        bus.fail_next_subscribes(1);

        assert!(bus.subscribe("a/#").await.is_err());
        assert!(bus.subscribe("a/#").await.is_ok());

        bus.set_publish_failing(true);
        assert!(matches!(
            bus.publish("a/b", Vec::new()).await,
            Err(BusError::Publish { .. })
        ));
        assert!(bus.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_unlisten_and_unsubscribe() {
        let bus = MemoryBus::new();
        let _rx = bus.listen("a/#").await.unwrap();
        bus.subscribe("a/#").await.unwrap();

        bus.unlisten("a/#").await.unwrap();
        bus.unsubscribe("a/#").await.unwrap();

        assert_eq!(bus.listener_count().await, 0);
        assert!(bus.subscriptions().await.is_empty());
    }
}
