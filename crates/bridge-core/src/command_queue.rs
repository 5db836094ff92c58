//! Bounded command queue with coalescing, expiry and retry bookkeeping.
//!
//! Commands wait here until their target device opens its receive window,
//! the only delivery opportunity on this radio link. The queue never
//! transmits itself: the publish pipeline drains it through
//! [`CommandQueue::begin_retry`] and reports outcomes back with
//! [`CommandQueue::remove`], keeping this type free of I/O and clocks.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bridge_proto::{CommandType, DeviceId};
use thiserror::Error;

/// Errors from queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandQueueError {
    /// The queue is at capacity and the `(target, type)` pair is new.
    #[error("command queue full ({capacity} entries)")]
    QueueFull {
        /// Configured capacity
        capacity: usize,
    },
}

/// How an enqueue landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new entry was appended.
    Added,
    /// An existing `(target, type)` entry absorbed the new parameters.
    Coalesced,
}

/// One queued command awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    /// Target device
    pub target: DeviceId,
    /// Command type
    pub command: CommandType,
    /// ASCII-decimal parameter bytes
    pub params: Vec<u8>,
    /// When the command was (last) enqueued
    pub enqueued_at: Instant,
    /// Transmission attempts so far
    pub retries: u32,
}

struct QueueInner {
    entries: VecDeque<QueuedCommand>,
}

/// Bounded FIFO of pending commands, shared by the broker ingress and the
/// retry path.
///
/// Coalescing gives most-recent-wins semantics: re-enqueueing an existing
/// `(target, type)` pair replaces its parameters, resets its retry counter
/// and refreshes its timestamp, so at most one entry per pair exists.
#[derive(Clone)]
pub struct CommandQueue {
    inner: Arc<Mutex<QueueInner>>,
    capacity: usize,
    expiration: Duration,
}

impl CommandQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new(capacity: usize, expiration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner { entries: VecDeque::new() })),
            capacity,
            expiration,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Enqueue a command, coalescing on `(target, type)`.
    pub fn enqueue(
        &self,
        target: DeviceId,
        command: CommandType,
        params: Vec<u8>,
        now: Instant,
    ) -> Result<EnqueueOutcome, CommandQueueError> {
        let mut inner = self.lock();

        if let Some(entry) =
            inner.entries.iter_mut().find(|e| e.target == target && e.command == command)
        {
            entry.params = params;
            entry.retries = 0;
            entry.enqueued_at = now;
            tracing::debug!(device = %target, command = ?command, "coalesced queued command");
            return Ok(EnqueueOutcome::Coalesced);
        }

        if inner.entries.len() >= self.capacity {
            tracing::warn!(device = %target, command = ?command, "command queue full");
            return Err(CommandQueueError::QueueFull { capacity: self.capacity });
        }

        inner.entries.push_back(QueuedCommand {
            target,
            command,
            params,
            enqueued_at: now,
            retries: 0,
        });
        Ok(EnqueueOutcome::Added)
    }

    /// Remove entries older than the expiration window. Returns what was
    /// dropped so the caller can log it.
    pub fn expire_older_than(&self, now: Instant) -> Vec<QueuedCommand> {
        let mut inner = self.lock();
        let mut expired = Vec::new();
        inner.entries.retain(|entry| {
            if now.duration_since(entry.enqueued_at) >= self.expiration {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Start a retry round for `target`: expire stale entries first, then
    /// return the remaining matching entries with their retry counters
    /// already incremented.
    ///
    /// The caller transmits each returned command and calls
    /// [`Self::remove`] on success; failed entries stay queued for the next
    /// round.
    pub fn begin_retry(&self, target: DeviceId, now: Instant) -> Vec<QueuedCommand> {
        for expired in self.expire_older_than(now) {
            tracing::info!(
                device = %expired.target,
                command = ?expired.command,
                retries = expired.retries,
                "expired queued command"
            );
        }

        let mut inner = self.lock();
        inner
            .entries
            .iter_mut()
            .filter(|entry| entry.target == target)
            .map(|entry| {
                entry.retries += 1;
                entry.clone()
            })
            .collect()
    }

    /// Remove the entry for `(target, command)`. Returns whether one
    /// existed.
    pub fn remove(&self, target: DeviceId, command: CommandType) -> bool {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| !(e.target == target && e.command == command));
        inner.entries.len() < before
    }

    /// Pending entries for one device, for the admin surface.
    #[must_use]
    pub fn snapshot_for(&self, target: DeviceId) -> Vec<QueuedCommand> {
        self.lock().entries.iter().filter(|e| e.target == target).cloned().collect()
    }

    /// Total queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: DeviceId = DeviceId(0xAABB_CCDD_EEFF_0011);
    const OTHER: DeviceId = DeviceId(0x1111_2222_3333_4444);

    fn queue() -> CommandQueue {
        CommandQueue::new(10, Duration::from_secs(300))
    }

    #[test]
    fn enqueue_and_snapshot() {
        let q = queue();
        let now = Instant::now();
        assert_eq!(
            q.enqueue(TARGET, CommandType::SetInterval, b"90".to_vec(), now).unwrap(),
            EnqueueOutcome::Added
        );

        let pending = q.snapshot_for(TARGET);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].params, b"90");
        assert_eq!(pending[0].retries, 0);
        assert!(q.snapshot_for(OTHER).is_empty());
    }

    #[test]
    fn coalescing_keeps_one_entry_with_latest_params() {
        let q = queue();
        let t0 = Instant::now();
        q.enqueue(TARGET, CommandType::SetInterval, b"90".to_vec(), t0).unwrap();

        // Simulate an attempt so the retry counter is non-zero.
        let _ = q.begin_retry(TARGET, t0);
        assert_eq!(q.snapshot_for(TARGET)[0].retries, 1);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(
            q.enqueue(TARGET, CommandType::SetInterval, b"120".to_vec(), t1).unwrap(),
            EnqueueOutcome::Coalesced
        );

        let pending = q.snapshot_for(TARGET);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].params, b"120");
        assert_eq!(pending[0].retries, 0, "coalescing resets the retry counter");
        assert_eq!(pending[0].enqueued_at, t1, "coalescing refreshes the timestamp");
    }

    #[test]
    fn different_command_types_do_not_coalesce() {
        let q = queue();
        let now = Instant::now();
        q.enqueue(TARGET, CommandType::SetInterval, b"90".to_vec(), now).unwrap();
        q.enqueue(TARGET, CommandType::SetSleep, b"0".to_vec(), now).unwrap();
        assert_eq!(q.snapshot_for(TARGET).len(), 2);
    }

    #[test]
    fn queue_full_refuses_new_but_still_coalesces() {
        let q = CommandQueue::new(2, Duration::from_secs(300));
        let now = Instant::now();
        q.enqueue(TARGET, CommandType::SetInterval, b"90".to_vec(), now).unwrap();
        q.enqueue(TARGET, CommandType::SetSleep, b"0".to_vec(), now).unwrap();

        assert_eq!(
            q.enqueue(OTHER, CommandType::Restart, Vec::new(), now),
            Err(CommandQueueError::QueueFull { capacity: 2 })
        );

        // Re-enqueueing an existing pair succeeds even at capacity.
        assert_eq!(
            q.enqueue(TARGET, CommandType::SetInterval, b"60".to_vec(), now).unwrap(),
            EnqueueOutcome::Coalesced
        );
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn begin_retry_increments_and_filters_by_target() {
        let q = queue();
        let now = Instant::now();
        q.enqueue(TARGET, CommandType::Restart, Vec::new(), now).unwrap();
        q.enqueue(OTHER, CommandType::Restart, Vec::new(), now).unwrap();

        let round = q.begin_retry(TARGET, now);
        assert_eq!(round.len(), 1);
        assert_eq!(round[0].target, TARGET);
        assert_eq!(round[0].retries, 1);

        // The other device's entry is untouched.
        assert_eq!(q.snapshot_for(OTHER)[0].retries, 0);

        let round = q.begin_retry(TARGET, now);
        assert_eq!(round[0].retries, 2);
    }

    #[test]
    fn expiry_runs_before_retry() {
        let q = queue();
        let t0 = Instant::now();
        q.enqueue(TARGET, CommandType::Restart, Vec::new(), t0).unwrap();

        let late = t0 + Duration::from_secs(300);
        let round = q.begin_retry(TARGET, late);
        assert!(round.is_empty(), "expired command must not be retried");
        assert!(q.snapshot_for(TARGET).is_empty());
    }

    #[test]
    fn expire_older_than_reports_dropped_entries() {
        let q = queue();
        let t0 = Instant::now();
        q.enqueue(TARGET, CommandType::Restart, Vec::new(), t0).unwrap();
        q.enqueue(OTHER, CommandType::Calibrate, Vec::new(), t0 + Duration::from_secs(200))
            .unwrap();

        let expired = q.expire_older_than(t0 + Duration::from_secs(350));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].target, TARGET);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let q = queue();
        let now = Instant::now();
        q.enqueue(TARGET, CommandType::Restart, Vec::new(), now).unwrap();

        assert!(q.remove(TARGET, CommandType::Restart));
        assert!(!q.remove(TARGET, CommandType::Restart));
        assert!(q.is_empty());
    }

    #[test]
    fn prop_at_most_one_entry_per_pair_within_capacity() {
        use proptest::prelude::{any, prop, proptest};

        proptest!(|(ops in prop::collection::vec((0u64..4, 0u8..3, any::<u16>()), 0..64))| {
            let q = CommandQueue::new(4, Duration::from_secs(300));
            let now = Instant::now();
            for (target, kind, param) in ops {
                let command = match kind {
                    0 => CommandType::SetInterval,
                    1 => CommandType::SetSleep,
                    _ => CommandType::Restart,
                };
                let _ = q.enqueue(
                    DeviceId(target),
                    command,
                    param.to_string().into_bytes(),
                    now,
                );
            }

            assert!(q.len() <= 4, "capacity bound violated");
            for target in 0..4u64 {
                let snapshot = q.snapshot_for(DeviceId(target));
                let mut kinds: Vec<u8> = snapshot.iter().map(|e| e.command.to_u8()).collect();
                kinds.sort_unstable();
                kinds.dedup();
                assert_eq!(kinds.len(), snapshot.len(), "duplicate (target, type) pair");
            }
        });
    }

    #[test]
    fn coalescing_window_resets_expiry() {
        let q = queue();
        let t0 = Instant::now();
        q.enqueue(TARGET, CommandType::SetInterval, b"90".to_vec(), t0).unwrap();

        // Refresh just before expiry; the entry survives past the original
        // deadline.
        let t1 = t0 + Duration::from_secs(299);
        q.enqueue(TARGET, CommandType::SetInterval, b"120".to_vec(), t1).unwrap();

        let round = q.begin_retry(TARGET, t0 + Duration::from_secs(301));
        assert_eq!(round.len(), 1);
        assert_eq!(round[0].params, b"120");
    }
}
