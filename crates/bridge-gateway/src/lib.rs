//! LoRa-to-MQTT bridge gateway.
//!
//! Production glue around [`bridge_core`]'s state and [`bridge_proto`]'s
//! codec: two long-lived pipeline tasks (receive at the radio end, publish
//! at the broker end) joined by a bounded decoded-record queue, with the
//! radio behind a single arbiter and the broker behind an injected trait.
//!
//! # Components
//!
//! - [`ReceivePipeline`]: radio polling, validation, dedup, registry
//!   updates, ACKs
//! - [`PublishPipeline`]: broker upkeep, translation, command ingress and
//!   opportunistic command delivery
//! - [`RadioArbiter`]: exclusive ownership of the radio hardware
//! - [`MqttBroker`] / [`ChannelBroker`]: production client and test double
//!   behind the [`Broker`] trait
//! - [`JsonFileStore`]: registry persistence document
//! - [`SidecarClient`]: optional best-effort HTTP mirror
//! - [`Watchdog`]: liveness enforcement for both pipelines

pub mod broker;
mod config;
mod error;
pub mod publish;
pub mod radio;
pub mod receive;
mod sidecar;
mod store;
pub mod translate;
mod watchdog;

use std::time::Duration;

pub use broker::{Broker, BrokerError, BrokerEvent, ChannelBroker, ChannelBrokerHandle, MqttBroker};
use bridge_core::{CommandQueue, DeviceRegistry, PipelineCounters, RegistryStore};
pub use config::{BrokerConfig, GatewayConfig, TopicsConfig};
pub use error::GatewayError;
pub use publish::{PublishConfig, PublishPipeline};
pub use radio::{
    RadioArbiter, RadioDriver, RadioError, RadioState, ReceivedFrame, SimulatedRadio,
    SimulatedRadioHandle,
};
pub use receive::{ReceiveConfig, ReceivePipeline};
pub use sidecar::{SidecarClient, SidecarHandle};
pub use store::JsonFileStore;
use tokio::sync::{mpsc, watch};
pub use watchdog::{Watchdog, WatchdogHandle};

/// Both pipelines must feed the watchdog within this window.
const WATCHDOG_LIMIT: Duration = Duration::from_secs(30);

/// Assembled bridge: pipelines, watchdog and optional sidecar, ready to
/// run.
pub struct Gateway<R: RadioDriver, S: RegistryStore, B: Broker + 'static> {
    receive: ReceivePipeline<R, S>,
    publish: PublishPipeline<R, S, B>,
    sidecar: Option<SidecarClient>,
    watchdog: Watchdog,
    registry: DeviceRegistry<S>,
    counters: PipelineCounters,
}

impl<R: RadioDriver, S: RegistryStore, B: Broker + 'static> Gateway<R, S, B> {
    /// Wire the bridge from configuration and injected collaborators.
    ///
    /// Restores the persisted registry document; a corrupt or unreadable
    /// document is logged and ignored, matching the best-effort persistence
    /// contract.
    #[must_use]
    pub fn new(config: &GatewayConfig, radio: R, broker: B, store: S) -> Self {
        let registry =
            DeviceRegistry::new(store, config.registry_capacity, config.dedup_ring_size);
        match registry.load_persisted() {
            Ok(restored) => tracing::info!(restored, "registry restored"),
            Err(err) => tracing::warn!(error = %err, "registry restore failed, starting empty"),
        }

        let commands =
            CommandQueue::new(config.command_queue_capacity, config.command_expiration());
        let counters = PipelineCounters::new();
        let (record_tx, record_rx) = mpsc::channel(config.record_queue_capacity);
        let arbiter = RadioArbiter::new(radio);
        let watchdog = Watchdog::new(WATCHDOG_LIMIT);

        let (sidecar, sidecar_handle) = match &config.sidecar_url {
            Some(url) => {
                let (client, handle) = SidecarClient::new(url.clone());
                (Some(client), handle)
            }
            None => (None, SidecarHandle::disabled()),
        };

        let receive = ReceivePipeline::new(
            arbiter.clone(),
            registry.clone(),
            record_tx,
            counters.clone(),
            watchdog.register("receive"),
            ReceiveConfig::default(),
        );

        let publish_config = PublishConfig {
            prefix: config.topics.prefix.clone(),
            command_topic: config.topics.command.clone(),
            ack_topic: config.topics.command_ack.clone(),
            status_topic: config.topics.gateway_status.clone(),
            gateway_id: config.gateway_id.clone(),
            address: local_address(),
            ..PublishConfig::default()
        };
        let publish = PublishPipeline::new(
            arbiter,
            registry.clone(),
            commands,
            record_rx,
            broker,
            sidecar_handle,
            watchdog.register("publish"),
            publish_config,
        );

        Self { receive, publish, sidecar, watchdog, registry, counters }
    }

    /// Shared registry handle, for the admin surface.
    #[must_use]
    pub fn registry(&self) -> DeviceRegistry<S> {
        self.registry.clone()
    }

    /// Shared pipeline counters, for the admin surface.
    #[must_use]
    pub fn counters(&self) -> PipelineCounters {
        self.counters.clone()
    }

    /// Run both pipelines until a termination signal or a watchdog trip.
    ///
    /// # Errors
    ///
    /// [`GatewayError::WatchdogStarved`] when a pipeline stops feeding the
    /// watchdog; the process must exit so the supervisor restarts it.
    pub async fn run(self) -> Result<(), GatewayError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut receive_task = tokio::spawn(self.receive.run(shutdown_rx.clone()));
        let mut publish_task = tokio::spawn(self.publish.run(shutdown_rx.clone()));
        let sidecar_task = self.sidecar.map(|client| tokio::spawn(client.run(shutdown_rx)));

        let result = tokio::select! {
            name = self.watchdog.clone().watch() => {
                let _ = shutdown_tx.send(true);
                let _ = (&mut receive_task).await;
                let _ = (&mut publish_task).await;
                Err(GatewayError::WatchdogStarved(name))
            }
            _ = &mut receive_task => {
                let _ = shutdown_tx.send(true);
                let _ = (&mut publish_task).await;
                Err(GatewayError::PipelineExited("receive"))
            }
            _ = &mut publish_task => {
                let _ = shutdown_tx.send(true);
                let _ = (&mut receive_task).await;
                Err(GatewayError::PipelineExited("publish"))
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("termination signal, shutting down");
                let _ = shutdown_tx.send(true);
                let _ = (&mut receive_task).await;
                let _ = (&mut publish_task).await;
                Ok(())
            }
        };

        if let Some(task) = sidecar_task {
            let _ = task.await;
        }
        result
    }
}

/// Best-effort network identity for the gateway status document.
fn local_address() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
