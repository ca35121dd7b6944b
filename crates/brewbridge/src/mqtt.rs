//! `MqttBus`: `MessageBus` over an MQTT broker

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brewbridge_core::{BusError, BusMessage, ListenerSet, MessageBus};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 64;

/// MQTT-backed message bus
///
/// A background task drives the rumqttc event loop and hands inbound
/// publishes to the registered listeners. Subscriptions are renewed after
/// every reconnect.
pub struct MqttBus {
    client: AsyncClient,
    listeners: Arc<ListenerSet>,
    subscriptions: Arc<Mutex<HashSet<String>>>,
    event_loop: JoinHandle<()>,
}

impl MqttBus {
    /// Connect to the broker described by `config`
    ///
    /// Must be called within a tokio runtime. The connection itself is made
    /// by the background task and retried until the bus is dropped.
    #[must_use]
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive.max(5)));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let listeners = Arc::new(ListenerSet::new());
        let subscriptions = Arc::new(Mutex::new(HashSet::new()));

        info!(host = %config.host, port = config.port, "connecting to MQTT broker");

        let event_loop = tokio::spawn(drive(
            event_loop,
            client.clone(),
            listeners.clone(),
            subscriptions.clone(),
            config.reconnect_after(),
        ));

        Self {
            client,
            listeners,
            subscriptions,
            event_loop,
        }
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect failed");
        }
        self.event_loop.abort();
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

async fn drive(
    mut event_loop: EventLoop,
    client: AsyncClient,
    listeners: Arc<ListenerSet>,
    subscriptions: Arc<Mutex<HashSet<String>>>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BusMessage::new(publish.topic, publish.payload.to_vec());
                let delivered = listeners.dispatch(&message).await;
                if delivered == 0 {
                    debug!(topic = %message.topic, "no listener for message");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to MQTT broker");
                // The request channel is drained by this loop, so never await here
                for pattern in subscriptions.lock().await.iter() {
                    if let Err(e) = client.try_subscribe(pattern, QoS::AtLeastOnce) {
                        warn!(topic = %pattern, error = %e, "failed to renew subscription");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, delay = ?reconnect_delay, "MQTT connection error");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn subscribe(&self, pattern: &str) -> Result<(), BusError> {
        self.client
            .subscribe(pattern, QoS::AtLeastOnce)
            .await
            .map_err(|e| BusError::Subscribe {
                topic: pattern.to_string(),
                reason: e.to_string(),
            })?;
        self.subscriptions.lock().await.insert(pattern.to_string());
        debug!(topic = %pattern, "subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, pattern: &str) -> Result<(), BusError> {
        self.subscriptions.lock().await.remove(pattern);
        self.client
            .unsubscribe(pattern)
            .await
            .map_err(|e| BusError::Subscribe {
                topic: pattern.to_string(),
                reason: e.to_string(),
            })
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
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}
