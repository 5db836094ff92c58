//! Decoded-record type and aggregate pipeline counters.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use bridge_proto::FrameHeader;
use bytes::Bytes;

/// One validated reception travelling from the receive pipeline to the
/// publish pipeline.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    /// Validated frame header
    pub header: FrameHeader,
    /// Raw payload bytes (payload decoding happens at translation time)
    pub payload: Bytes,
    /// RSSI of the reception, dBm
    pub rssi_dbm: i16,
    /// SNR of the reception, dB
    pub snr_db: i8,
    /// Local wall-clock time of the reception
    pub received_at: SystemTime,
}

impl DecodedRecord {
    /// Local receive time as unix seconds (0 before the epoch).
    #[must_use]
    pub fn received_unix(&self) -> u64 {
        self.received_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Point-in-time counter values for the periodic status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReport {
    /// Frames decoded, deduplicated and enqueued
    pub received_ok: u64,
    /// Frames lost to decode errors or a full record queue
    pub dropped: u64,
    /// Frames suppressed by the dedup ring
    pub duplicates_filtered: u64,
}

#[derive(Default)]
struct CounterCells {
    received_ok: AtomicU64,
    dropped: AtomicU64,
    duplicates_filtered: AtomicU64,
}

/// Shared aggregate counters for the receive path.
///
/// Clones share the same cells; increments are relaxed atomics. The report
/// is a monitoring aid, not a synchronization point.
#[derive(Clone, Default)]
pub struct PipelineCounters {
    cells: Arc<CounterCells>,
}

impl PipelineCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a frame that made it onto the record queue.
    pub fn record_received(&self) {
        self.cells.received_ok.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame lost to a decode error or queue overflow.
    pub fn record_dropped(&self) {
        self.cells.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame suppressed as a duplicate.
    pub fn record_duplicate(&self) {
        self.cells.duplicates_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current values.
    #[must_use]
    pub fn report(&self) -> CounterReport {
        CounterReport {
            received_ok: self.cells.received_ok.load(Ordering::Relaxed),
            dropped: self.cells.dropped.load(Ordering::Relaxed),
            duplicates_filtered: self.cells.duplicates_filtered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_shared_between_clones() {
        let counters = PipelineCounters::new();
        let other = counters.clone();

        counters.record_received();
        other.record_dropped();
        other.record_duplicate();
        other.record_duplicate();

        let report = counters.report();
        assert_eq!(
            report,
            CounterReport { received_ok: 1, dropped: 1, duplicates_filtered: 2 }
        );
    }
}
