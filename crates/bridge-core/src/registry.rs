//! Device registry: identity, per-device state and duplicate suppression.
//!
//! Maps a 64-bit device identity to its mutable record: friendly name,
//! location, sensor kind, link metrics and the deduplication ring of
//! recently seen sequence numbers. The registry is the only in-memory state
//! shared by the receive and publish pipelines; every public operation takes
//! the single internal lock for a short critical section.
//!
//! Capacity is bounded. At the limit a new device is refused and logged:
//! evicting would also evict its dedup ring and re-publish retransmissions.
//!
//! Persistence is best-effort: mutations of durable fields write the full
//! table through the injected [`RegistryStore`]; a failed save is logged and
//! the in-memory record stays authoritative.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bridge_proto::DeviceId;
use serde::Serialize;
use thiserror::Error;

use crate::storage::{PersistedDevice, RegistryStore, StoreError};

/// Empty-slot marker in the dedup ring.
///
/// Devices must never emit sequence `0xFFFF`: right after a ring reset the
/// first such frame would match the sentinel-filled slots and be filtered as
/// a duplicate. Documented limitation, pinned by a test.
pub const DEDUP_SENTINEL: u16 = 0xFFFF;

/// Errors from registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry is at capacity and refused a new device.
    #[error("registry full ({capacity} devices): refusing {device}")]
    CapacityFull {
        /// Device that was refused
        device: DeviceId,
        /// Configured capacity
        capacity: usize,
    },
}

/// Sensor hardware classification, derived from READINGS payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorKind {
    /// Temperature + humidity + pressure
    EnvironmentalMulti,
    /// Temperature only
    TemperatureOnly,
    /// Humidity + temperature
    HumidityTemperature,
    /// Not yet classified
    #[default]
    Unknown,
}

impl SensorKind {
    /// Token used on the broker and in the persistence document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnvironmentalMulti => "environmental-multi",
            Self::TemperatureOnly => "temperature-only",
            Self::HumidityTemperature => "humidity-temperature",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the persisted token. Unknown tokens map to `Unknown`.
    #[must_use]
    pub fn from_str_lossy(token: &str) -> Self {
        match token {
            "environmental-multi" => Self::EnvironmentalMulti,
            "temperature-only" => Self::TemperatureOnly,
            "humidity-temperature" => Self::HumidityTemperature,
            _ => Self::Unknown,
        }
    }

    /// Classify from a READINGS payload: a live pressure channel marks the
    /// multi-sensor, else a live humidity channel marks the hygrometer.
    #[must_use]
    pub fn classify(pressure_centi: u32, humidity_centi: u16) -> Self {
        if pressure_centi != 0 {
            Self::EnvironmentalMulti
        } else if humidity_centi != 0 {
            Self::HumidityTemperature
        } else {
            Self::TemperatureOnly
        }
    }
}

/// Fixed-size ring of recently observed sequence numbers.
///
/// Holds the last `size` non-duplicate sequences regardless of
/// monotonicity; a packet older than `size` newer packets is reported as
/// fresh again. Documented trade-off.
#[derive(Debug, Clone)]
struct DedupRing {
    slots: Box<[u16]>,
    index: usize,
}

impl DedupRing {
    fn new(size: usize) -> Self {
        Self { slots: vec![DEDUP_SENTINEL; size.max(1)].into_boxed_slice(), index: 0 }
    }

    /// Full scan. The sentinel matches too, see [`DEDUP_SENTINEL`].
    fn contains(&self, sequence: u16) -> bool {
        self.slots.contains(&sequence)
    }

    fn record(&mut self, sequence: u16) {
        self.slots[self.index] = sequence;
        self.index = (self.index + 1) % self.slots.len();
    }

    fn clear(&mut self) {
        self.slots.fill(DEDUP_SENTINEL);
        self.index = 0;
    }
}

/// Mutable per-device state. Owned by the registry, never handed out by
/// reference.
#[derive(Debug, Clone)]
struct DeviceRecord {
    name: String,
    location: String,
    kind: SensorKind,
    last_seen_unix: u64,
    last_rssi_dbm: i16,
    last_snr_db: i8,
    packet_count: u64,
    last_sequence: u16,
    ring: DedupRing,
    read_interval_s: u16,
    deep_sleep_s: u16,
}

impl DeviceRecord {
    fn with_defaults(id: DeviceId, ring_size: usize) -> Self {
        Self {
            name: id.short_name(),
            location: "unknown".to_string(),
            kind: SensorKind::Unknown,
            last_seen_unix: 0,
            last_rssi_dbm: 0,
            last_snr_db: 0,
            packet_count: 0,
            last_sequence: 0,
            ring: DedupRing::new(ring_size),
            read_interval_s: 0,
            deep_sleep_s: 0,
        }
    }
}

/// Consistent, copy-based view of one device, safe to hand to external
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    /// Identity as the external 16-hex-char token
    pub device_id: String,
    /// Friendly name
    pub name: String,
    /// Location string
    pub location: String,
    /// Sensor kind token
    pub sensor_kind: &'static str,
    /// Unix seconds of the last reception
    pub last_seen: u64,
    /// RSSI of the last reception, dBm
    pub rssi: i16,
    /// SNR of the last reception, dB
    pub snr: i8,
    /// Total frames received
    pub packet_count: u64,
    /// Last observed sequence number
    pub last_sequence: u16,
    /// Last configured read interval reported by the device, seconds
    pub read_interval_s: u16,
    /// Last configured deep-sleep duration reported by the device, seconds
    pub deep_sleep_s: u16,
}

struct RegistryInner {
    devices: HashMap<u64, DeviceRecord>,
}

/// Bounded, internally-serialized device registry.
///
/// Cloneable; clones share the same table. All operations lock one mutex
/// for a short critical section, so both pipelines may call in freely.
#[derive(Clone)]
pub struct DeviceRegistry<S: RegistryStore> {
    inner: Arc<Mutex<RegistryInner>>,
    store: S,
    capacity: usize,
    ring_size: usize,
}

impl<S: RegistryStore> DeviceRegistry<S> {
    /// Create an empty registry with the given bounds.
    #[must_use]
    pub fn new(store: S, capacity: usize, ring_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner { devices: HashMap::new() })),
            store,
            capacity,
            ring_size,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A poisoned lock means a pipeline already died; the watchdog will
        // restart the process, so recover the data rather than cascade.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Restore names, locations, kinds and counters persisted by a previous
    /// run. Returns the number of devices restored.
    pub fn load_persisted(&self) -> Result<usize, StoreError> {
        let document = self.store.load()?;
        let mut inner = self.lock();
        let mut restored = 0;
        for entry in document {
            if inner.devices.len() >= self.capacity {
                tracing::warn!(capacity = self.capacity, "persisted document exceeds capacity");
                break;
            }
            let Ok(raw) = entry.id.parse::<u64>() else {
                tracing::warn!(id = %entry.id, "skipping unparsable persisted device id");
                continue;
            };
            let record = inner
                .devices
                .entry(raw)
                .or_insert_with(|| DeviceRecord::with_defaults(DeviceId(raw), self.ring_size));
            record.name = entry.name;
            record.location = entry.location;
            record.kind = entry
                .sensor_kind
                .as_deref()
                .map(SensorKind::from_str_lossy)
                .unwrap_or_default();
            record.last_seen_unix = entry.last_seen;
            record.packet_count = entry.packet_count;
            record.last_rssi_dbm = entry.rssi;
            record.last_snr_db = entry.snr;
            tracing::debug!(device = %DeviceId(raw), name = %record.name, "restored device");
            restored += 1;
        }
        Ok(restored)
    }

    /// Create a record with defaults if absent.
    pub fn ensure(&self, id: DeviceId) -> Result<(), RegistryError> {
        let created = {
            let mut inner = self.lock();
            self.ensure_locked(&mut inner, id)?
        };
        if created {
            tracing::info!(device = %id, "discovered new device");
            self.persist();
        }
        Ok(())
    }

    /// Returns whether a record was created. Caller persists outside the
    /// lock.
    fn ensure_locked(
        &self,
        inner: &mut RegistryInner,
        id: DeviceId,
    ) -> Result<bool, RegistryError> {
        if inner.devices.contains_key(&id.0) {
            return Ok(false);
        }
        if inner.devices.len() >= self.capacity {
            tracing::warn!(device = %id, capacity = self.capacity, "registry full, refusing device");
            return Err(RegistryError::CapacityFull { device: id, capacity: self.capacity });
        }
        inner.devices.insert(id.0, DeviceRecord::with_defaults(id, self.ring_size));
        Ok(true)
    }

    /// Record a validated reception: update link metrics, bump the packet
    /// count and write the sequence into the dedup ring. Auto-creates the
    /// device.
    pub fn observe(
        &self,
        id: DeviceId,
        sequence: u16,
        rssi_dbm: i16,
        snr_db: i8,
        now_unix: u64,
    ) -> Result<(), RegistryError> {
        let created = {
            let mut inner = self.lock();
            let created = self.ensure_locked(&mut inner, id)?;
            // Entry exists after ensure_locked.
            if let Some(record) = inner.devices.get_mut(&id.0) {
                record.last_seen_unix = now_unix;
                record.last_rssi_dbm = rssi_dbm;
                record.last_snr_db = snr_db;
                record.packet_count += 1;
                record.last_sequence = sequence;
                record.ring.record(sequence);
            }
            created
        };
        if created {
            tracing::info!(device = %id, "discovered new device");
            self.persist();
        }
        Ok(())
    }

    /// Scan the device's dedup ring for an exact sequence match.
    ///
    /// Unknown devices are never duplicates.
    #[must_use]
    pub fn is_duplicate(&self, id: DeviceId, sequence: u16) -> bool {
        let inner = self.lock();
        inner.devices.get(&id.0).is_some_and(|record| record.ring.contains(sequence))
    }

    /// Reset the device's dedup ring to all-sentinel. No-op for unknown
    /// devices.
    pub fn clear_dedup(&self, id: DeviceId) {
        let mut inner = self.lock();
        if let Some(record) = inner.devices.get_mut(&id.0) {
            record.ring.clear();
            tracing::debug!(device = %id, "dedup ring cleared");
        }
    }

    /// Update the friendly name. No-op when unchanged; persists otherwise.
    pub fn set_name(&self, id: DeviceId, name: &str) {
        self.set_field(id, |record| {
            if record.name == name {
                false
            } else {
                record.name = name.to_string();
                true
            }
        });
    }

    /// Update the location. No-op when unchanged; persists otherwise.
    pub fn set_location(&self, id: DeviceId, location: &str) {
        self.set_field(id, |record| {
            if record.location == location {
                false
            } else {
                record.location = location.to_string();
                true
            }
        });
    }

    /// Update the sensor kind. No-op when unchanged; persists otherwise.
    pub fn set_sensor_kind(&self, id: DeviceId, kind: SensorKind) {
        self.set_field(id, |record| {
            if record.kind == kind {
                false
            } else {
                record.kind = kind;
                true
            }
        });
    }

    /// Update the device-reported configuration. No-op when unchanged;
    /// persists otherwise.
    pub fn set_config(&self, id: DeviceId, read_interval_s: u16, deep_sleep_s: u16) {
        self.set_field(id, |record| {
            if record.read_interval_s == read_interval_s && record.deep_sleep_s == deep_sleep_s {
                false
            } else {
                record.read_interval_s = read_interval_s;
                record.deep_sleep_s = deep_sleep_s;
                true
            }
        });
    }

    /// Shared setter plumbing: auto-create, apply, persist when changed.
    /// A capacity refusal is logged and the write dropped.
    fn set_field(&self, id: DeviceId, apply: impl FnOnce(&mut DeviceRecord) -> bool) {
        let changed = {
            let mut inner = self.lock();
            if self.ensure_locked(&mut inner, id).is_err() {
                return;
            }
            inner.devices.get_mut(&id.0).is_some_and(apply)
        };
        if changed {
            self.persist();
        }
    }

    /// Friendly name, auto-creating with defaults so the translator can
    /// always emit one. At capacity the derived default is returned without
    /// creating a record.
    #[must_use]
    pub fn lookup_name(&self, id: DeviceId) -> String {
        let mut inner = self.lock();
        let _ = self.ensure_locked(&mut inner, id);
        inner.devices.get(&id.0).map_or_else(|| id.short_name(), |r| r.name.clone())
    }

    /// Location, auto-creating with defaults. At capacity `"unknown"` is
    /// returned without creating a record.
    #[must_use]
    pub fn lookup_location(&self, id: DeviceId) -> String {
        let mut inner = self.lock();
        let _ = self.ensure_locked(&mut inner, id);
        inner.devices.get(&id.0).map_or_else(|| "unknown".to_string(), |r| r.location.clone())
    }

    /// Consistent point-in-time view of the whole table, ordered by
    /// identity. Built inside the lock; shares nothing with the registry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let inner = self.lock();
        let mut entries: Vec<_> = inner
            .devices
            .iter()
            .map(|(&raw, record)| DeviceSnapshot {
                device_id: DeviceId(raw).hex(),
                name: record.name.clone(),
                location: record.location.clone(),
                sensor_kind: record.kind.as_str(),
                last_seen: record.last_seen_unix,
                rssi: record.last_rssi_dbm,
                snr: record.last_snr_db,
                packet_count: record.packet_count,
                last_sequence: record.last_sequence,
                read_interval_s: record.read_interval_s,
                deep_sleep_s: record.deep_sleep_s,
            })
            .collect();
        entries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        entries
    }

    /// Single-device view. `None` if unknown.
    #[must_use]
    pub fn get(&self, id: DeviceId) -> Option<DeviceSnapshot> {
        self.snapshot().into_iter().find(|s| s.device_id == id.hex())
    }

    /// Number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    /// True when no devices are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the full table through the store. Best-effort: failures are
    /// logged, never propagated. The document is built inside the lock, the
    /// store write happens outside it.
    fn persist(&self) {
        let document: Vec<PersistedDevice> = {
            let inner = self.lock();
            let mut entries: Vec<_> = inner
                .devices
                .iter()
                .map(|(&raw, record)| PersistedDevice {
                    id: raw.to_string(),
                    name: record.name.clone(),
                    location: record.location.clone(),
                    sensor_kind: Some(record.kind.as_str().to_string()),
                    last_seen: record.last_seen_unix,
                    packet_count: record.packet_count,
                    rssi: record.last_rssi_dbm,
                    snr: record.last_snr_db,
                })
                .collect();
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            entries
        };
        if let Err(err) = self.store.save(&document) {
            tracing::warn!(error = %err, "registry persistence failed, in-memory state kept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn registry() -> DeviceRegistry<MemoryStore> {
        DeviceRegistry::new(MemoryStore::new(), 10, 50)
    }

    const DEV: DeviceId = DeviceId(0xAABB_CCDD_EEFF_0011);

    #[test]
    fn auto_discovery_applies_defaults() {
        let reg = registry();
        reg.observe(DEV, 1, -85, 9, 1000).unwrap();

        let snap = reg.get(DEV).unwrap();
        assert_eq!(snap.name, "sensor_eeff0011");
        assert_eq!(snap.location, "unknown");
        assert_eq!(snap.sensor_kind, "unknown");
        assert_eq!(snap.packet_count, 1);
        assert_eq!(snap.last_seen, 1000);
        assert_eq!(snap.rssi, -85);
        assert_eq!(snap.snr, 9);
    }

    #[test]
    fn duplicate_detection_within_ring() {
        let reg = registry();
        assert!(!reg.is_duplicate(DEV, 7), "unknown device is never a duplicate");

        reg.observe(DEV, 7, -85, 9, 1000).unwrap();
        assert!(reg.is_duplicate(DEV, 7));
        assert!(!reg.is_duplicate(DEV, 8));
    }

    #[test]
    fn ring_holds_exactly_the_last_50_sequences() {
        let reg = registry();
        for seq in 0..51u16 {
            reg.observe(DEV, seq, -85, 9, 1000).unwrap();
        }
        // Sequence 0 was pushed out by the 51st observation.
        assert!(!reg.is_duplicate(DEV, 0));
        for seq in 1..51u16 {
            assert!(reg.is_duplicate(DEV, seq), "sequence {seq} should still be in the ring");
        }
    }

    #[test]
    fn clear_dedup_makes_prior_sequences_fresh() {
        let reg = registry();
        reg.observe(DEV, 7, -85, 9, 1000).unwrap();
        assert!(reg.is_duplicate(DEV, 7));

        reg.clear_dedup(DEV);
        assert!(!reg.is_duplicate(DEV, 7));
    }

    #[test]
    fn sentinel_sequence_is_always_duplicate() {
        // Documented limitation: 0xFFFF matches empty slots, so a fresh ring
        // reports it as a duplicate.
        let reg = registry();
        reg.observe(DEV, 1, -85, 9, 1000).unwrap();
        assert!(reg.is_duplicate(DEV, DEDUP_SENTINEL));
    }

    #[test]
    fn capacity_refusal_leaves_table_intact() {
        let reg = DeviceRegistry::new(MemoryStore::new(), 2, 50);
        reg.observe(DeviceId(1), 1, 0, 0, 0).unwrap();
        reg.observe(DeviceId(2), 1, 0, 0, 0).unwrap();

        let err = reg.observe(DeviceId(3), 1, 0, 0, 0).unwrap_err();
        assert_eq!(
            err,
            RegistryError::CapacityFull { device: DeviceId(3), capacity: 2 }
        );

        assert_eq!(reg.len(), 2);
        assert!(reg.get(DeviceId(1)).is_some());
        assert!(reg.get(DeviceId(2)).is_some());
        assert!(reg.get(DeviceId(3)).is_none());
    }

    #[test]
    fn lookup_at_capacity_returns_defaults_without_creating() {
        let reg = DeviceRegistry::new(MemoryStore::new(), 1, 50);
        reg.observe(DeviceId(1), 1, 0, 0, 0).unwrap();

        assert_eq!(reg.lookup_name(DeviceId(0xEEFF_0011)), "sensor_eeff0011");
        assert_eq!(reg.lookup_location(DeviceId(0xEEFF_0011)), "unknown");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn setters_no_op_when_unchanged() {
        let store = MemoryStore::new();
        let reg = DeviceRegistry::new(store.clone(), 10, 50);
        reg.set_name(DEV, "greenhouse");
        let saves = store.save_count();

        reg.set_name(DEV, "greenhouse");
        assert_eq!(store.save_count(), saves, "unchanged name must not persist");

        reg.set_name(DEV, "orchard");
        assert_eq!(store.save_count(), saves + 1);
    }

    #[test]
    fn persistence_failure_keeps_memory_authoritative() {
        let store = MemoryStore::new();
        let reg = DeviceRegistry::new(store.clone(), 10, 50);
        store.fail_saves(true);

        reg.set_name(DEV, "greenhouse");
        assert_eq!(reg.lookup_name(DEV), "greenhouse");
        assert!(store.document().is_empty());
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let reg = registry();
        reg.observe(DEV, 1, -85, 9, 1000).unwrap();

        let before = reg.snapshot();
        reg.set_name(DEV, "renamed");
        assert_eq!(before[0].name, "sensor_eeff0011");
        assert_eq!(reg.snapshot()[0].name, "renamed");
    }

    #[test]
    fn load_persisted_restores_rich_document() {
        let store = MemoryStore::seeded(vec![PersistedDevice {
            id: DEV.0.to_string(),
            name: "greenhouse".to_string(),
            location: "north".to_string(),
            sensor_kind: Some("environmental-multi".to_string()),
            last_seen: 777,
            packet_count: 41,
            rssi: -90,
            snr: 5,
        }]);
        let reg = DeviceRegistry::new(store, 10, 50);
        assert_eq!(reg.load_persisted().unwrap(), 1);

        let snap = reg.get(DEV).unwrap();
        assert_eq!(snap.name, "greenhouse");
        assert_eq!(snap.location, "north");
        assert_eq!(snap.sensor_kind, "environmental-multi");
        assert_eq!(snap.packet_count, 41);

        // Counters keep accumulating from the restored values.
        reg.observe(DEV, 42, -85, 9, 1000).unwrap();
        assert_eq!(reg.get(DEV).unwrap().packet_count, 42);
    }

    #[test]
    fn load_persisted_accepts_minimal_layout() {
        // Migration reader: older gateways wrote only id/name/location.
        let store = MemoryStore::seeded(vec![PersistedDevice {
            id: "17".to_string(),
            name: "cellar".to_string(),
            location: "basement".to_string(),
            sensor_kind: None,
            last_seen: 0,
            packet_count: 0,
            rssi: 0,
            snr: 0,
        }]);
        let reg = DeviceRegistry::new(store, 10, 50);
        assert_eq!(reg.load_persisted().unwrap(), 1);

        let snap = reg.get(DeviceId(17)).unwrap();
        assert_eq!(snap.name, "cellar");
        assert_eq!(snap.sensor_kind, "unknown");
    }

    #[test]
    fn classify_sensor_kind() {
        assert_eq!(SensorKind::classify(101_325, 5520), SensorKind::EnvironmentalMulti);
        assert_eq!(SensorKind::classify(0, 5520), SensorKind::HumidityTemperature);
        assert_eq!(SensorKind::classify(0, 0), SensorKind::TemperatureOnly);
    }
}
