//! Message-broker abstraction.
//!
//! The publish pipeline talks to the broker through this trait so tests can
//! inject disconnects, slow acks and malformed inbound messages. The
//! production implementation wraps rumqttc; the channel-backed double lives
//! next to it the way the in-memory store sits next to the production one.

mod channel;
mod mqtt;

pub use channel::{ChannelBroker, ChannelBrokerHandle, PublishedMessage};
pub use mqtt::MqttBroker;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from broker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The connection is down; the pipeline retries on its interval.
    #[error("broker disconnected: {0}")]
    Disconnected(String),

    /// An individual publish or subscribe failed.
    #[error("broker request failed: {0}")]
    Request(String),
}

/// Events surfaced while driving the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Session (re-)established; subscriptions must be replayed.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Inbound message on a subscribed topic.
    Message {
        /// Topic the message arrived on
        topic: String,
        /// Raw payload bytes
        payload: Vec<u8>,
    },
}

/// Broker client surface used by the publish pipeline.
#[async_trait]
pub trait Broker: Send {
    /// Publish a message.
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), BrokerError>;

    /// Subscribe to a topic.
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Drive the connection's periodic work (keep-alive, callback
    /// dispatch), waiting up to `timeout` for the next event.
    async fn poll(&mut self, timeout: Duration) -> Option<BrokerEvent>;

    /// Kick off a reconnect attempt after a disconnect. Completion is
    /// reported through a later [`BrokerEvent::Connected`].
    async fn reconnect(&mut self);
}
