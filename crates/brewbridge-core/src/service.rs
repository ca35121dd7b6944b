//! Bridge service loop: startup guard, actor, message forwarding, teardown

use std::sync::Arc;

use kameo::actor::Spawn;
use tracing::{error, info, warn};

use crate::actor::{BridgeActor, BridgeActorArgs};
use crate::actuator::Actuator;
use crate::bus::MessageBus;
use crate::config::BridgeSettings;
use crate::error::BridgeError;
use crate::guard::StartupGuard;
use crate::message::{BridgeStatus, GetStatus, HandleMessage};
use crate::publisher::Publisher;
use crate::shutdown::Shutdown;

/// Run the bridge until `shutdown` fires or the bus listener closes
///
/// Returns the final status of the bridge actor.
///
/// # Errors
/// Startup errors (`Shutdown`, `StartupExhausted`) and actor communication
/// errors. Per-message failures are logged and never end the loop.
pub async fn run_bridge(
    settings: BridgeSettings,
    bus: Arc<dyn MessageBus>,
    actuator: Arc<dyn Actuator>,
    shutdown: Shutdown,
) -> Result<BridgeStatus, BridgeError> {
    settings.target.validate()?;

    info!(
        key = %settings.target.monitored_key,
        block = %settings.target.block_name,
        device = %settings.target.device_id,
        topic = %settings.topic_pattern,
        "starting bridge"
    );

    let guard = StartupGuard::new(
        bus.clone(),
        actuator.clone(),
        settings.topic_pattern.clone(),
        settings.startup.clone(),
    );
    let readiness = guard.run(&shutdown).await?;
    let mut listener = readiness.listener;

    info!(
        device = %actuator.device_id(),
        value = readiness.initial_value,
        attempts = readiness.attempts,
        "bridge ready"
    );

    let actor_ref = BridgeActor::spawn(BridgeActorArgs {
        target: settings.target.clone(),
        confirm: settings.confirm.clone(),
        actuator,
        publisher: Publisher::new(bus.clone()),
        shutdown: shutdown.clone(),
        initial_value: Some(readiness.initial_value),
    });

    let mut stop = shutdown.clone();
    loop {
        tokio::select! {
            biased;
            () = stop.wait() => {
                info!("shutdown requested, stopping bridge");
                break;
            }
            message = listener.recv() => {
                let Some(message) = message else {
                    warn!(topic = %settings.topic_pattern, "bus listener closed");
                    break;
                };
                if let Err(e) = actor_ref.tell(HandleMessage::from(message)).await {
                    error!(error = %e, "failed to forward message to bridge actor");
                    break;
                }
            }
        }
    }

    if let Err(e) = bus.unsubscribe(&settings.topic_pattern).await {
        warn!(error = %e, "failed to unsubscribe");
    }
    if let Err(e) = bus.unlisten(&settings.topic_pattern).await {
        warn!(error = %e, "failed to unregister listener");
    }

    let status = actor_ref
        .ask(GetStatus)
        .await
        .map_err(|e| BridgeError::ActorError(e.to_string()));

    actor_ref.stop_gracefully().await.ok();
    status
}
