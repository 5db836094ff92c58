//! Publish pipeline and command path: decoded-record queue → broker, and
//! broker → command queue → radio.
//!
//! One task multiplexes four concerns:
//!
//! 1. Broker connection upkeep: poll the client, re-subscribe and publish
//!    the retained online status after every (re)connect, pace reconnect
//!    attempts at 5 s while down.
//! 2. Record translation: drain the decoded-record queue (only while the
//!    broker is up, so the bounded queue back-pressures during outages) and
//!    publish per-device readings/status/events.
//! 3. Command ingress: validate JSON commands from the command topic,
//!    enqueue them and acknowledge on the ack topic.
//! 4. Opportunistic command delivery: a record from a device is the only
//!    proof it is listening: wait out the sensor's RX-window offset, then
//!    drain its queued commands through the radio arbiter.

use std::time::{Duration, Instant};

use bridge_core::{
    CommandQueue, DecodedRecord, DeviceRegistry, QueuedCommand, RegistryStore, SensorKind,
};
use bridge_proto::{
    CommandPayload, CommandType, DeviceId, Frame, FrameHeader, MessageType, Payload,
};
use tokio::sync::{mpsc, watch};

use crate::{
    broker::{Broker, BrokerEvent},
    radio::{RadioArbiter, RadioDriver, RadioError},
    sidecar::SidecarHandle,
    translate,
    watchdog::WatchdogHandle,
};

/// Publish pipeline tunables.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Per-device topic prefix
    pub prefix: String,
    /// Inbound command topic
    pub command_topic: String,
    /// Command acknowledgement topic
    pub ack_topic: String,
    /// Retained gateway status topic
    pub status_topic: String,
    /// Gateway identity for the status document
    pub gateway_id: String,
    /// Network address advertised in the status document
    pub address: String,
    /// Pause between reconnect attempts while the broker is down
    pub reconnect_interval: Duration,
    /// Delay after a reception before command retries (sensor RX-window
    /// offset)
    pub rx_window_delay: Duration,
    /// Quiet period between consecutive command transmissions
    pub retry_gap: Duration,
    /// Bounded wait on the record queue
    pub dequeue_timeout: Duration,
    /// Arbiter timeout for command transmission
    pub acquire_timeout: Duration,
    /// BUSY-line wait before transmission
    pub busy_timeout: Duration,
    /// Settle pause after a transmission
    pub tx_settle: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            prefix: "esp-sensor-hub".to_string(),
            command_topic: "lora/command".to_string(),
            ack_topic: "lora/command/ack".to_string(),
            status_topic: "esp-sensor-hub/gateway/status".to_string(),
            gateway_id: "lora-bridge".to_string(),
            address: "unknown".to_string(),
            reconnect_interval: Duration::from_secs(5),
            rx_window_delay: Duration::from_secs(3),
            retry_gap: Duration::from_millis(50),
            dequeue_timeout: Duration::from_millis(100),
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            tx_settle: Duration::from_millis(10),
        }
    }
}

/// The publish/command task.
pub struct PublishPipeline<R: RadioDriver, S: RegistryStore, B: Broker> {
    arbiter: RadioArbiter<R>,
    registry: DeviceRegistry<S>,
    commands: CommandQueue,
    records: mpsc::Receiver<DecodedRecord>,
    broker: B,
    sidecar: SidecarHandle,
    watchdog: WatchdogHandle,
    config: PublishConfig,
    connected: bool,
    last_reconnect: Instant,
    tx_sequence: u16,
}

impl<R: RadioDriver, S: RegistryStore, B: Broker> PublishPipeline<R, S, B> {
    /// Assemble the pipeline.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arbiter: RadioArbiter<R>,
        registry: DeviceRegistry<S>,
        commands: CommandQueue,
        records: mpsc::Receiver<DecodedRecord>,
        broker: B,
        sidecar: SidecarHandle,
        watchdog: WatchdogHandle,
        config: PublishConfig,
    ) -> Self {
        Self {
            arbiter,
            registry,
            commands,
            records,
            broker,
            sidecar,
            watchdog,
            config,
            connected: false,
            last_reconnect: Instant::now(),
            tx_sequence: 0,
        }
    }

    /// Run until shutdown. Publishes the retained offline status on the way
    /// out.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.watchdog.feed();

            if !self.connected && self.last_reconnect.elapsed() >= self.config.reconnect_interval {
                self.last_reconnect = Instant::now();
                self.broker.reconnect().await;
            }

            if let Some(event) = self.broker.poll(Duration::from_millis(10)).await {
                self.handle_broker_event(event).await;
                continue;
            }

            if self.connected {
                match tokio::time::timeout(self.config.dequeue_timeout, self.records.recv()).await
                {
                    Ok(Some(record)) => self.handle_record(record).await,
                    Ok(None) => {
                        tracing::error!("record queue closed, publish pipeline stopping");
                        break;
                    }
                    Err(_elapsed) => {}
                }
            } else {
                // Leave records queued while the broker is down; the bounded
                // queue back-pressures the receive path.
                tokio::time::sleep(self.config.dequeue_timeout).await;
            }
        }

        let offline =
            translate::gateway_status_message(&self.config.gateway_id, &self.config.address, false);
        let _ = self
            .broker
            .publish(&self.config.status_topic, offline.to_string().into_bytes(), true)
            .await;
        tracing::debug!("publish pipeline shutting down");
    }

    async fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => {
                self.connected = true;
                tracing::info!("broker connected");
                if let Err(err) = self.broker.subscribe(&self.config.command_topic).await {
                    tracing::warn!(error = %err, "command topic subscribe failed");
                }
                let online = translate::gateway_status_message(
                    &self.config.gateway_id,
                    &self.config.address,
                    true,
                );
                if let Err(err) = self
                    .broker
                    .publish(&self.config.status_topic, online.to_string().into_bytes(), true)
                    .await
                {
                    tracing::warn!(error = %err, "gateway status publish failed");
                }
            }
            BrokerEvent::Disconnected => {
                if self.connected {
                    tracing::warn!("broker disconnected");
                }
                self.connected = false;
                self.last_reconnect = Instant::now();
            }
            BrokerEvent::Message { topic, payload } => {
                if topic == self.config.command_topic {
                    self.handle_command_ingress(&payload).await;
                } else {
                    tracing::debug!(topic = %topic, "ignoring message on unexpected topic");
                }
            }
        }
    }

    /// Validate, enqueue and acknowledge one inbound command object.
    async fn handle_command_ingress(&mut self, payload: &[u8]) {
        let request: translate::CommandRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "malformed command message");
                return;
            }
        };
        let action = request.action.as_str();
        let device_hex = request.device_id.clone();

        let (device, command, params) = match translate::validate_command(&request) {
            Ok(validated) => validated,
            Err(rejection) => {
                tracing::warn!(error = %rejection, device = %device_hex, "command rejected");
                self.publish_ack(&device_hex, action, "rejected").await;
                return;
            }
        };

        match self.commands.enqueue(device, command, params.clone(), Instant::now()) {
            Ok(outcome) => {
                tracing::info!(device = %device, action, ?outcome, "command queued");
                self.publish_ack(&device_hex, action, "queued").await;
                self.sidecar.command(serde_json::json!({
                    "device_id": device.0.to_string(),
                    "action": action,
                    "params": String::from_utf8_lossy(&params).into_owned(),
                }));

                // Eager blind attempt: the device is almost certainly not
                // listening, so the entry stays queued either way and the
                // post-reception retry round remains authoritative.
                if let Err(err) = self.send_command(device, command, &params).await {
                    tracing::debug!(error = %err, device = %device, "eager transmit missed");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, device = %device, action, "command enqueue failed");
                self.publish_ack(&device_hex, action, "queue_full").await;
            }
        }
    }

    async fn publish_ack(&mut self, device_hex: &str, action: &str, status: &str) {
        let ack = translate::ack_message(device_hex, action, status);
        if let Err(err) = self
            .broker
            .publish(&self.config.ack_topic, ack.to_string().into_bytes(), false)
            .await
        {
            tracing::warn!(error = %err, "command ack publish failed");
        }
    }

    /// Process one decoded record: retry pending commands for its device,
    /// then translate and publish it.
    async fn handle_record(&mut self, record: DecodedRecord) {
        let device = record.header.device_id;

        if !self.commands.snapshot_for(device).is_empty() {
            // The device listens briefly after transmitting; match its
            // RX-window offset before sending.
            tokio::time::sleep(self.config.rx_window_delay).await;
            self.retry_commands(device).await;
        }

        let payload = match Payload::decode(record.header.message_type, &record.payload) {
            Ok(payload) => payload,
            Err(err) => {
                // The receive path validated this; only a version skew
                // between pipelines could land here.
                tracing::warn!(error = %err, device = %device, "undecodable record payload");
                return;
            }
        };

        match payload {
            Payload::Readings(readings) => self.publish_readings(device, &readings, &record).await,
            Payload::Status(status) => self.publish_status(device, &status, &record).await,
            Payload::Event(event) => self.publish_event(device, &event, &record).await,
            Payload::Command(_) | Payload::Ack(_) => {
                tracing::debug!(device = %device, "ignoring bridge-originated message type");
            }
        }
    }

    /// One retry round for a device that just proved it is listening.
    async fn retry_commands(&mut self, device: DeviceId) {
        let round = self.commands.begin_retry(device, Instant::now());
        for entry in round {
            let QueuedCommand { command, params, retries, .. } = entry;
            match self.send_command(device, command, &params).await {
                Ok(()) => {
                    self.commands.remove(device, command);
                    tracing::info!(device = %device, ?command, retries, "queued command delivered");
                }
                Err(err) => {
                    tracing::warn!(
                        device = %device,
                        ?command,
                        retries,
                        error = %err,
                        "command transmit failed, keeping queued"
                    );
                }
            }
            tokio::time::sleep(self.config.retry_gap).await;
        }
    }

    /// Transmit one command frame through the arbiter.
    async fn send_command(
        &mut self,
        target: DeviceId,
        command: CommandType,
        params: &[u8],
    ) -> Result<(), RadioError> {
        self.tx_sequence = self.tx_sequence.wrapping_add(1);
        let payload = CommandPayload::new(command, params.to_vec()).encode();
        let header = FrameHeader::new(MessageType::Command, target, self.tx_sequence);
        let frame = Frame::new(header, payload)
            .map_err(|err| RadioError::Tx(format!("command frame: {err}")))?;

        let mut radio = self.arbiter.acquire(self.config.acquire_timeout).await?;
        radio.standby()?;
        if let Err(err) = radio.wait_busy_clear(self.config.busy_timeout) {
            let _ = radio.start_receive();
            return Err(err);
        }

        let outcome = radio.transmit(&frame.to_vec());
        tokio::time::sleep(self.config.tx_settle).await;
        if let Err(err) = radio.start_receive() {
            tracing::warn!(error = %err, "receive restart failed after command");
        }
        outcome
    }

    async fn publish_readings(
        &mut self,
        device: DeviceId,
        readings: &bridge_proto::ReadingsPayload,
        record: &DecodedRecord,
    ) {
        let kind = SensorKind::classify(readings.pressure_centi, readings.humidity_centi);
        self.registry.set_sensor_kind(device, kind);

        let name = self.registry.lookup_name(device);
        let location = self.registry.lookup_location(device);
        let message = translate::readings_message(device, &name, &location, readings, record);
        let topic = translate::device_topic(&self.config.prefix, device, "readings");
        self.publish_json(&topic, &message).await;
    }

    async fn publish_status(
        &mut self,
        device: DeviceId,
        status: &bridge_proto::StatusPayload,
        record: &DecodedRecord,
    ) {
        let reported_name = status.name_str();
        if !reported_name.is_empty() {
            self.registry.set_name(device, &reported_name);
        }
        let reported_location = status.location_str();
        if !reported_location.is_empty() {
            self.registry.set_location(device, &reported_location);
        }
        self.registry.set_config(device, status.read_interval_s, status.deep_sleep_s);

        let name = self.registry.lookup_name(device);
        let location = self.registry.lookup_location(device);
        let message = translate::status_message(device, &name, &location, status, record);
        let topic = translate::device_topic(&self.config.prefix, device, "status");
        self.publish_json(&topic, &message).await;

        self.sidecar.device(serde_json::json!({
            "id": device.0.to_string(),
            "name": name,
            "location": location,
            "last_seen": record.received_unix(),
        }));
    }

    async fn publish_event(
        &mut self,
        device: DeviceId,
        event: &bridge_proto::EventPayload,
        record: &DecodedRecord,
    ) {
        if event.is_startup() {
            tracing::info!(device = %device, "device startup, clearing dedup ring");
            self.registry.clear_dedup(device);
        }

        let name = self.registry.lookup_name(device);
        let message = translate::event_message(device, &name, event, record);
        let topic = translate::device_topic(&self.config.prefix, device, "events");
        self.publish_json(&topic, &message).await;

        self.sidecar.event(serde_json::json!({
            "device_id": device.0.to_string(),
            "event_type": event.event_type,
            "severity": event.severity.as_str(),
            "message": event.message_str(),
            "received_at": record.received_unix(),
        }));
    }

    async fn publish_json(&mut self, topic: &str, message: &serde_json::Value) {
        if let Err(err) = self.broker.publish(topic, message.to_string().into_bytes(), false).await
        {
            tracing::warn!(error = %err, topic = %topic, "publish failed");
        }
    }
}
