//! JSON file implementation of the registry store.
//!
//! The whole registry persists as one JSON document. Writes go through a
//! temp file followed by a rename so a crash mid-write never corrupts the
//! document that startup will read back.

use std::{path::PathBuf, sync::Arc};

use bridge_core::{PersistedDevice, RegistryStore, StoreError};

/// File-backed registry store.
#[derive(Clone)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
}

impl JsonFileStore {
    /// Store backed by the given path. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }
}

impl RegistryStore for JsonFileStore {
    fn save(&self, devices: &[PersistedDevice]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(devices)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, self.path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))
    }

    fn load(&self) -> Result<Vec<PersistedDevice>, StoreError> {
        let body = match std::fs::read(self.path.as_ref()) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        serde_json::from_slice(&body).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedDevice {
        PersistedDevice {
            id: "12302652060662169617".to_string(),
            name: "greenhouse".to_string(),
            location: "north".to_string(),
            sensor_kind: Some("environmental-multi".to_string()),
            last_seen: 1_234_567_890,
            packet_count: 17,
            rssi: -85,
            snr: 9,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("devices.json"));

        store.save(&[sample()]).unwrap();
        assert_eq!(store.load().unwrap(), vec![sample()]);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), Vec::new());
    }

    #[test]
    fn minimal_legacy_document_loads_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            r#"[{"id": "17", "name": "cellar", "location": "basement"}]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "cellar");
        assert_eq!(loaded[0].sensor_kind, None);
        assert_eq!(loaded[0].packet_count, 0);
    }

    #[test]
    fn malformed_document_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));
    }
}
