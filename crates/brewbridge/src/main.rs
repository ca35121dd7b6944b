//! brewbridge daemon
//!
//! Follows one Brewblox block on the MQTT history stream and mirrors its
//! desired state onto a Homebridge switch

use std::path::PathBuf;
use std::sync::Arc;

use brewbridge_core::{ShutdownTrigger, run_bridge, shutdown};
use brewbridge_hub::{HubActuator, HubClient};
use clap::Parser;
use color_eyre::Result;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod mqtt;

use config::Config;
use mqtt::MqttBus;

/// Mirror a Brewblox block onto a Homebridge switch
#[derive(Parser, Debug)]
#[command(name = "brewbridge", version, about)]
struct Args {
    /// Config file (default: search BREWBRIDGE_CONFIG and standard paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between confirmation reads
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Block name to monitor
    #[arg(long)]
    block_name: Option<String>,

    /// Brewblox service holding the block
    #[arg(long)]
    service: Option<String>,

    /// Homebridge host
    #[arg(long, alias = "homebridge_host")]
    homebridge_host: Option<String>,

    /// Homebridge port
    #[arg(long, alias = "homebridge_port")]
    homebridge_port: Option<u16>,

    /// Homebridge auth code (PIN)
    #[arg(long, alias = "homebridge_auth_code", env = "BREWBRIDGE_HOMEBRIDGE_AUTH_CODE")]
    homebridge_auth_code: Option<String>,

    /// Homebridge device name
    #[arg(long, alias = "homebridge_device")]
    homebridge_device: Option<String>,

    /// MQTT broker host
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// History topic prefix
    #[arg(long)]
    history_topic: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Flags win over file values
    fn apply(self, config: &mut Config) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut config.bridge.poll_interval, self.poll_interval);
        set(&mut config.bridge.block_name, self.block_name);
        set(&mut config.bridge.service, self.service);
        set(&mut config.homebridge.host, self.homebridge_host);
        set(&mut config.homebridge.port, self.homebridge_port);
        set(&mut config.homebridge.auth_code, self.homebridge_auth_code);
        set(&mut config.homebridge.device, self.homebridge_device);
        set(&mut config.mqtt.host, self.mqtt_host);
        set(&mut config.mqtt.port, self.mqtt_port);
        set(&mut config.mqtt.history_topic, self.history_topic);
        set(&mut config.log.level, self.log_level);
        config.log.json |= self.log_json;
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Flip `trigger` on Ctrl-C or SIGTERM
fn spawn_signal_handler(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("signal received, shutting down");
        trigger.trigger();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let (mut config, source) = match &args.config {
        Some(path) => (Config::load(path)?, Some(path.clone())),
        None => Config::load_default()?,
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config);

    match &source {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => info!("no config file found, using defaults and flags"),
    }

    let settings = config.bridge_settings();

    let client = HubClient::from_host(
        &config.homebridge.host,
        config.homebridge.port,
        config.homebridge.auth_code.clone(),
    )?;
    let actuator = Arc::new(HubActuator::new(client, &config.homebridge.device));
    let bus = Arc::new(MqttBus::connect(&config.mqtt));

    let (trigger, shutdown) = shutdown::channel();
    spawn_signal_handler(trigger);

    info!(version = env!("CARGO_PKG_VERSION"), "brewbridge starting");

    let result = run_bridge(settings, bus.clone(), actuator, shutdown).await;
    bus.disconnect().await;

    match result {
        Ok(status) => {
            info!(
                block = %status.block,
                device = %status.device,
                last_state = %status.last_state,
                handled = status.handled,
                transitions = status.transitions,
                published = status.published,
                ignored = status.ignored,
                failures = status.failures,
                actuation_failures = status.actuation_failures,
                "brewbridge stopped"
            );
            Ok(())
        }
        Err(brewbridge_core::BridgeError::Shutdown) => {
            info!("brewbridge stopped before it became ready");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
