//! Channel-backed broker double for tests and simulation.
//!
//! Records every publish, replays injected inbound events, and can be
//! scripted to drop the connection or fail publishes. Starts disconnected
//! with a pending `Connected` event so the pipeline's connect handling runs
//! on first poll, like a real session.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use super::{Broker, BrokerError, BrokerEvent};

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Target topic
    pub topic: String,
    /// Payload bytes
    pub payload: Vec<u8>,
    /// Retain flag
    pub retain: bool,
}

#[derive(Default)]
struct ChannelInner {
    events: VecDeque<BrokerEvent>,
    published: Vec<PublishedMessage>,
    subscriptions: Vec<String>,
    fail_publish: bool,
}

/// In-process broker double.
pub struct ChannelBroker {
    inner: Arc<Mutex<ChannelInner>>,
}

/// Scripting/inspection handle for [`ChannelBroker`].
#[derive(Clone)]
pub struct ChannelBrokerHandle {
    inner: Arc<Mutex<ChannelInner>>,
}

fn lock(inner: &Arc<Mutex<ChannelInner>>) -> std::sync::MutexGuard<'_, ChannelInner> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ChannelBroker {
    /// Create a broker double with a `Connected` event already queued.
    #[must_use]
    pub fn new() -> (Self, ChannelBrokerHandle) {
        let inner = Arc::new(Mutex::new(ChannelInner::default()));
        lock(&inner).events.push_back(BrokerEvent::Connected);
        (Self { inner: Arc::clone(&inner) }, ChannelBrokerHandle { inner })
    }
}

#[async_trait]
impl Broker for ChannelBroker {
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), BrokerError> {
        let mut inner = lock(&self.inner);
        if inner.fail_publish {
            return Err(BrokerError::Disconnected("injected publish failure".to_string()));
        }
        inner.published.push(PublishedMessage { topic: topic.to_string(), payload, retain });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        lock(&self.inner).subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Option<BrokerEvent> {
        if let Some(event) = lock(&self.inner).events.pop_front() {
            return Some(event);
        }
        tokio::time::sleep(timeout).await;
        lock(&self.inner).events.pop_front()
    }

    async fn reconnect(&mut self) {
        lock(&self.inner).events.push_back(BrokerEvent::Connected);
    }
}

impl ChannelBrokerHandle {
    /// Inject an inbound message.
    pub fn inject_message(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        lock(&self.inner).events.push_back(BrokerEvent::Message {
            topic: topic.to_string(),
            payload: payload.into(),
        });
    }

    /// Inject a connection drop.
    pub fn inject_disconnect(&self) {
        lock(&self.inner).events.push_back(BrokerEvent::Disconnected);
    }

    /// Inject a (re)connect.
    pub fn inject_connected(&self) {
        lock(&self.inner).events.push_back(BrokerEvent::Connected);
    }

    /// Make every subsequent publish fail until cleared.
    pub fn fail_publish(&self, fail: bool) {
        lock(&self.inner).fail_publish = fail;
    }

    /// All recorded publishes, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.inner).published.clone()
    }

    /// Recorded publishes on one topic.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published().into_iter().filter(|m| m.topic == topic).collect()
    }

    /// Topics subscribed so far.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.inner).subscriptions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_publishes_and_replays_events() {
        let (mut broker, handle) = ChannelBroker::new();

        assert_eq!(
            broker.poll(Duration::from_millis(1)).await,
            Some(BrokerEvent::Connected)
        );

        handle.inject_message("lora/command", br#"{"x":1}"#.to_vec());
        let event = broker.poll(Duration::from_millis(1)).await.unwrap();
        assert!(matches!(event, BrokerEvent::Message { ref topic, .. } if topic == "lora/command"));

        broker.publish("t", b"hello".to_vec(), false).await.unwrap();
        assert_eq!(handle.published()[0].payload, b"hello");
    }
}
