use std::sync::{Arc, Mutex};

use super::{PersistedDevice, RegistryStore, StoreError};

/// In-memory registry store for tests and simulation.
///
/// Thread-safe through a mutex; uses `lock().expect()` which panics if the
/// mutex is poisoned - acceptable for test code. Optionally fails every
/// `save` to exercise the best-effort persistence path.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    document: Vec<PersistedDevice>,
    saves: u64,
    fail_saves: bool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a document, as if a previous run had
    /// persisted it.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn seeded(document: Vec<PersistedDevice>) -> Self {
        let store = Self::new();
        store.inner.lock().expect("Mutex poisoned").document = document;
        store
    }

    /// Make every subsequent `save` fail with an I/O error.
    #[allow(clippy::expect_used)]
    pub fn fail_saves(&self, fail: bool) {
        self.inner.lock().expect("Mutex poisoned").fail_saves = fail;
    }

    /// Number of successful `save` calls.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn save_count(&self) -> u64 {
        self.inner.lock().expect("Mutex poisoned").saves
    }

    /// The currently stored document.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn document(&self) -> Vec<PersistedDevice> {
        self.inner.lock().expect("Mutex poisoned").document.clone()
    }
}

impl RegistryStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn save(&self, devices: &[PersistedDevice]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if inner.fail_saves {
            return Err(StoreError::Io("injected save failure".to_string()));
        }
        inner.document = devices.to_vec();
        inner.saves += 1;
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn load(&self) -> Result<Vec<PersistedDevice>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let doc = vec![PersistedDevice {
            id: "42".to_string(),
            name: "sensor_0000002a".to_string(),
            location: "unknown".to_string(),
            sensor_kind: None,
            last_seen: 0,
            packet_count: 0,
            rssi: 0,
            snr: 0,
        }];
        store.save(&doc).unwrap();
        assert_eq!(store.load().unwrap(), doc);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn injected_failure_surfaces_as_io_error() {
        let store = MemoryStore::new();
        store.fail_saves(true);
        assert!(matches!(store.save(&[]), Err(StoreError::Io(_))));
        assert_eq!(store.save_count(), 0);
    }
}
