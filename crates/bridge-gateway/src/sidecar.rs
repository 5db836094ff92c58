//! Optional HTTP persistence sidecar mirror.
//!
//! The sidecar is stateless and entirely best-effort: writes queue on the
//! bridge side (bounded, drop-oldest) and flow out whenever the sidecar is
//! healthy. Bridge operation is never affected by its absence. Device ids
//! travel as decimal strings so JSON consumers cannot truncate them.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

/// Bound on the bridge-side overflow queue.
const QUEUE_LIMIT: usize = 1000;

/// How often a healthy sidecar is probed.
const HEALTH_INTERVAL: Duration = Duration::from_secs(60);

/// How long to wait before re-probing an unhealthy sidecar.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// One mirrored write.
#[derive(Debug, Clone)]
pub enum SidecarWrite {
    /// Device snapshot for `/devices`
    Device(Value),
    /// Accepted command for `/commands`
    Command(Value),
    /// Device event for `/events`
    Event(Value),
}

impl SidecarWrite {
    fn path(&self) -> &'static str {
        match self {
            Self::Device(_) => "/devices",
            Self::Command(_) => "/commands",
            Self::Event(_) => "/events",
        }
    }

    fn body(&self) -> &Value {
        match self {
            Self::Device(v) | Self::Command(v) | Self::Event(v) => v,
        }
    }
}

/// Cheap handle the pipelines use to mirror writes. A disabled handle
/// swallows everything.
#[derive(Clone)]
pub struct SidecarHandle {
    tx: Option<mpsc::UnboundedSender<SidecarWrite>>,
}

impl SidecarHandle {
    /// Handle that drops all writes (no sidecar configured).
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Mirror a device snapshot.
    pub fn device(&self, body: Value) {
        self.send(SidecarWrite::Device(body));
    }

    /// Mirror an accepted command.
    pub fn command(&self, body: Value) {
        self.send(SidecarWrite::Command(body));
    }

    /// Mirror a device event.
    pub fn event(&self, body: Value) {
        self.send(SidecarWrite::Event(body));
    }

    fn send(&self, write: SidecarWrite) {
        if let Some(tx) = &self.tx {
            // The task owns the bounded queue; a closed channel means the
            // sidecar task is gone, which is fine (best-effort).
            let _ = tx.send(write);
        }
    }
}

/// Background task draining mirrored writes to the sidecar.
pub struct SidecarClient {
    base_url: String,
    http: reqwest::Client,
    rx: mpsc::UnboundedReceiver<SidecarWrite>,
    queue: VecDeque<SidecarWrite>,
    healthy: bool,
    last_probe: Option<Instant>,
}

impl SidecarClient {
    /// Create the client task and its handle.
    #[must_use]
    pub fn new(base_url: String) -> (Self, SidecarHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        (
            Self {
                base_url,
                http,
                rx,
                queue: VecDeque::new(),
                healthy: false,
                last_probe: None,
            },
            SidecarHandle { tx: Some(tx) },
        )
    }

    /// Run until shutdown. Never fails; every error only degrades to
    /// queueing.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            self.ingest();
            self.maybe_probe().await;

            if self.healthy {
                self.drain().await;
            }

            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Move pending writes into the bounded queue, dropping oldest on
    /// overflow.
    fn ingest(&mut self) {
        while let Ok(write) = self.rx.try_recv() {
            if self.queue.len() >= QUEUE_LIMIT {
                self.queue.pop_front();
                tracing::debug!("sidecar queue full, dropping oldest write");
            }
            self.queue.push_back(write);
        }
    }

    /// Probe health on the 60 s cadence, or the 30 s reconnect cadence
    /// while unhealthy.
    async fn maybe_probe(&mut self) {
        let interval = if self.healthy { HEALTH_INTERVAL } else { RECONNECT_INTERVAL };
        let due = self.last_probe.is_none_or(|at| at.elapsed() >= interval);
        if !due {
            return;
        }
        self.last_probe = Some(Instant::now());

        let url = format!("{}/health", self.base_url);
        let was_healthy = self.healthy;
        self.healthy = match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "sidecar health probe failed");
                false
            }
        };
        if self.healthy != was_healthy {
            tracing::info!(healthy = self.healthy, "sidecar health changed");
        }
    }

    /// Post queued writes in order; stop at the first failure and mark the
    /// sidecar unhealthy.
    async fn drain(&mut self) {
        while let Some(write) = self.queue.front() {
            let url = format!("{}{}", self.base_url, write.path());
            let result = self.http.post(&url).json(write.body()).send().await;
            match result {
                Ok(response) if response.status().is_success() => {
                    self.queue.pop_front();
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), url = %url, "sidecar write refused");
                    self.healthy = false;
                    return;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "sidecar write failed, keeping queue");
                    self.healthy = false;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_handle_swallows_writes() {
        let handle = SidecarHandle::disabled();
        handle.device(serde_json::json!({"id": "1"}));
        handle.event(serde_json::json!({"id": "1"}));
    }

    #[tokio::test]
    async fn queue_drops_oldest_beyond_limit() {
        let (mut client, handle) = SidecarClient::new("http://localhost:0".to_string());
        for i in 0..(QUEUE_LIMIT + 5) {
            handle.command(serde_json::json!({"seq": i}));
        }
        client.ingest();

        assert_eq!(client.queue.len(), QUEUE_LIMIT);
        // The five oldest writes were dropped.
        let Some(SidecarWrite::Command(first)) = client.queue.front() else {
            unreachable!("queue is non-empty");
        };
        assert_eq!(first["seq"], 5);
    }
}
