//! Production MQTT broker client over rumqttc.
//!
//! Plain TCP with optional credentials, keep-alive 15 s, QoS 1 for all
//! bridge traffic. A retained last-will `offline` status is registered with
//! the session so consumers observe gateway loss without polling; the
//! matching retained `online` message is published after every connect.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};

use crate::config::{BrokerConfig, TopicsConfig};

use super::{Broker, BrokerError, BrokerEvent};

/// rumqttc-backed broker client.
///
/// rumqttc reconnects by itself as long as the event loop keeps being
/// polled, so [`Broker::reconnect`] is a no-op here; the pipeline's retry
/// interval only paces how often it looks for the `Connected` event.
pub struct MqttBroker {
    client: AsyncClient,
    event_loop: rumqttc::EventLoop,
}

impl MqttBroker {
    /// Connect options from gateway configuration, including the retained
    /// last will on the gateway status topic.
    #[must_use]
    pub fn new(broker: &BrokerConfig, topics: &TopicsConfig, will_payload: Vec<u8>) -> Self {
        let mut options =
            MqttOptions::new(broker.client_id.clone(), broker.host.clone(), broker.port);
        options.set_keep_alive(Duration::from_secs(broker.keep_alive_s));
        if let (Some(user), Some(pass)) = (&broker.username, &broker.password) {
            options.set_credentials(user.clone(), pass.clone());
        }
        options.set_last_will(LastWill::new(
            topics.gateway_status.clone(),
            will_payload,
            QoS::AtLeastOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, 64);
        Self { client, event_loop }
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), BrokerError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| BrokerError::Request(e.to_string()))
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BrokerError::Request(e.to_string()))
    }

    async fn poll(&mut self, timeout: Duration) -> Option<BrokerEvent> {
        match tokio::time::timeout(timeout, self.event_loop.poll()).await {
            Err(_elapsed) => None,
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => Some(BrokerEvent::Connected),
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => Some(BrokerEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Ok(Ok(_)) => None,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "mqtt event loop error");
                Some(BrokerEvent::Disconnected)
            }
        }
    }

    async fn reconnect(&mut self) {
        // The event loop retries on the next poll.
    }
}
