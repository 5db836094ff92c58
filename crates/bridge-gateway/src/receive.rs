//! Receive pipeline: radio → decoded-record queue.
//!
//! Runs on its own task at the front of the bridge. Each iteration polls
//! the radio under the arbiter, validates the frame end to end (framing and
//! payload), filters duplicates, updates the registry and hands the record
//! to the publish pipeline over the bounded queue. Uplinks that carry data
//! (READINGS, STATUS, EVENT) are acknowledged on the radio; duplicates are
//! not.
//!
//! Every failure is local: a bad frame is a counter increment, a full queue
//! is a dropped record, a failed ACK is a log line. The loop itself only
//! ends on shutdown.

use std::time::{Duration, Instant, SystemTime};

use bridge_core::{DecodedRecord, DeviceRegistry, PipelineCounters, RegistryStore};
use bridge_proto::{AckPayload, Frame, FrameHeader, MessageType, Payload};
use tokio::sync::{mpsc, watch};

use crate::{
    radio::{RadioArbiter, RadioDriver, ReceivedFrame},
    watchdog::WatchdogHandle,
};

/// Receive pipeline tunables.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Sleep between empty radio polls
    pub poll_interval: Duration,
    /// Arbiter timeout for the short read/ack acquisitions
    pub acquire_timeout: Duration,
    /// Bounded wait when the record queue is full
    pub enqueue_timeout: Duration,
    /// Cadence of the aggregate counter report
    pub report_interval: Duration,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            acquire_timeout: Duration::from_secs(5),
            enqueue_timeout: Duration::from_millis(100),
            report_interval: Duration::from_secs(30),
        }
    }
}

/// The receive pipeline task.
pub struct ReceivePipeline<R: RadioDriver, S: RegistryStore> {
    arbiter: RadioArbiter<R>,
    registry: DeviceRegistry<S>,
    records: mpsc::Sender<DecodedRecord>,
    counters: PipelineCounters,
    watchdog: WatchdogHandle,
    config: ReceiveConfig,
    ack_sequence: u16,
}

impl<R: RadioDriver, S: RegistryStore> ReceivePipeline<R, S> {
    /// Assemble the pipeline.
    #[must_use]
    pub fn new(
        arbiter: RadioArbiter<R>,
        registry: DeviceRegistry<S>,
        records: mpsc::Sender<DecodedRecord>,
        counters: PipelineCounters,
        watchdog: WatchdogHandle,
        config: ReceiveConfig,
    ) -> Self {
        Self { arbiter, registry, records, counters, watchdog, config, ack_sequence: 0 }
    }

    /// Run until shutdown.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        // Bring the radio into continuous receive before the first poll.
        if let Ok(mut radio) = self.arbiter.acquire(self.config.acquire_timeout).await {
            let _ = radio.standby();
            if let Err(err) = radio.start_receive() {
                tracing::warn!(error = %err, "initial receive start failed");
            }
        }

        let mut last_report = Instant::now();
        loop {
            if *shutdown.borrow() {
                tracing::debug!("receive pipeline shutting down");
                return;
            }
            self.watchdog.feed();

            if last_report.elapsed() >= self.config.report_interval {
                let report = self.counters.report();
                tracing::info!(
                    received_ok = report.received_ok,
                    dropped = report.dropped,
                    duplicates_filtered = report.duplicates_filtered,
                    "receive counters"
                );
                last_report = Instant::now();
            }

            match self.poll_radio().await {
                Some(reception) => self.handle_reception(reception).await,
                None => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    /// Short arbiter hold: check data-ready, pull one frame, restart
    /// receive.
    async fn poll_radio(&self) -> Option<ReceivedFrame> {
        let mut radio = match self.arbiter.acquire(self.config.acquire_timeout).await {
            Ok(radio) => radio,
            Err(err) => {
                tracing::debug!(error = %err, "radio busy during poll");
                return None;
            }
        };

        if !radio.data_ready() {
            return None;
        }

        match radio.read_frame() {
            Ok(frame) => {
                let _ = radio.start_receive();
                frame
            }
            Err(err) => {
                tracing::warn!(error = %err, "radio read failed");
                let _ = radio.standby();
                let _ = radio.start_receive();
                None
            }
        }
    }

    async fn handle_reception(&mut self, reception: ReceivedFrame) {
        let frame = match Frame::decode(&reception.bytes) {
            Ok(frame) => frame,
            Err(err) => {
                self.counters.record_dropped();
                tracing::debug!(error = %err, len = reception.bytes.len(), "dropped bad frame");
                return;
            }
        };

        // Full validation before anything mutates: a structurally valid
        // frame with a garbage payload is dropped here, unacknowledged.
        if let Err(err) = Payload::decode(frame.header.message_type, &frame.payload) {
            self.counters.record_dropped();
            tracing::debug!(error = %err, device = %frame.header.device_id, "dropped bad payload");
            return;
        }

        let device = frame.header.device_id;
        let sequence = frame.header.sequence;

        if self.registry.is_duplicate(device, sequence) {
            self.counters.record_duplicate();
            tracing::debug!(device = %device, sequence, "duplicate filtered");
            return;
        }

        if let Err(err) = self.registry.observe(
            device,
            sequence,
            reception.rssi_dbm,
            reception.snr_db,
            unix_now(),
        ) {
            // Registry full: the device stays untracked but its data still
            // flows to the broker.
            tracing::warn!(error = %err, device = %device, "registry refused device");
        }

        let record = DecodedRecord {
            header: frame.header,
            payload: frame.payload,
            rssi_dbm: reception.rssi_dbm,
            snr_db: reception.snr_db,
            received_at: SystemTime::now(),
        };

        match self.records.send_timeout(record, self.config.enqueue_timeout).await {
            Ok(()) => self.counters.record_received(),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                self.counters.record_dropped();
                tracing::warn!(device = %device, "record queue full, dropping frame");
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                tracing::error!("record queue closed");
            }
        }

        if matches!(
            frame.header.message_type,
            MessageType::Readings | MessageType::Status | MessageType::Event
        ) {
            self.send_ack(device, sequence, reception.rssi_dbm, reception.snr_db).await;
        }
    }

    /// Acknowledge a reception on the radio. Failures are logged and do not
    /// abort the pipeline.
    async fn send_ack(
        &mut self,
        device: bridge_proto::DeviceId,
        sequence: u16,
        rssi_dbm: i16,
        snr_db: i8,
    ) {
        self.ack_sequence = self.ack_sequence.wrapping_add(1);
        let payload = AckPayload {
            ack_sequence: sequence,
            success: true,
            error_code: 0,
            rssi_dbm,
            snr_db,
        };
        let header = FrameHeader::new(MessageType::Ack, device, self.ack_sequence);
        let Ok(frame) = Frame::new(header, payload.encode().to_vec()) else {
            return;
        };

        let mut radio = match self.arbiter.acquire(self.config.acquire_timeout).await {
            Ok(radio) => radio,
            Err(err) => {
                tracing::warn!(error = %err, device = %device, "ack skipped, radio busy");
                return;
            }
        };

        let outcome = radio.standby().and_then(|()| radio.transmit(&frame.to_vec()));
        if let Err(err) = outcome {
            tracing::warn!(error = %err, device = %device, "ack transmit failed");
        }
        let _ = radio.standby();
        if let Err(err) = radio.start_receive() {
            tracing::warn!(error = %err, "receive restart failed after ack");
        }
    }
}

/// Local wall clock as unix seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
