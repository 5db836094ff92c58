//! Bridge gateway binary.
//!
//! # Usage
//!
//! ```bash
//! # Local broker, default topics
//! bridge-gateway
//!
//! # Explicit configuration
//! bridge-gateway --config gateway.toml --broker-host mqtt.example
//! ```

use std::path::PathBuf;

use bridge_gateway::{Gateway, GatewayConfig, JsonFileStore, MqttBroker, SimulatedRadio, translate};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// LoRa sensor bridge gateway
#[derive(Parser, Debug)]
#[command(name = "bridge-gateway")]
#[command(about = "Bridges a LoRa sensor network to an MQTT broker")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the broker host
    #[arg(long)]
    broker_host: Option<String>,

    /// Override the broker port
    #[arg(long)]
    broker_port: Option<u16>,

    /// Override the registry persistence path
    #[arg(long)]
    store: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(host) = args.broker_host {
        config.broker.host = host;
    }
    if let Some(port) = args.broker_port {
        config.broker.port = port;
    }
    if let Some(store) = args.store {
        config.store_path = store;
    }

    tracing::info!(
        broker = %config.broker.host,
        port = config.broker.port,
        prefix = %config.topics.prefix,
        "bridge gateway starting"
    );

    let will =
        translate::gateway_status_message(&config.gateway_id, "unknown", false).to_string();
    let broker = MqttBroker::new(&config.broker, &config.topics, will.into_bytes());
    let store = JsonFileStore::new(&config.store_path);

    // The physical LoRa driver is a deployment collaborator behind the
    // RadioDriver trait; the channel-fed simulator device stands in until
    // one is wired up.
    let (radio, _radio_handle) = SimulatedRadio::new();
    tracing::warn!("no hardware radio driver configured, using the simulator device");

    Gateway::new(&config, radio, broker, store).run().await?;

    Ok(())
}
