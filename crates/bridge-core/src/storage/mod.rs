//! Registry persistence abstraction.
//!
//! Trait-based abstraction over the durable document that survives bridge
//! restarts. The trait is synchronous; implementations share internal state
//! via `Arc` so clones write to the same backing store. Persistence is
//! best-effort throughout: the in-memory registry is authoritative and a
//! failed save is only logged.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

/// One device entry in the persistence document.
///
/// This is the richer of the two historical layouts. The minimal layout
/// (`{id, name, location}` only) still loads: every other field defaults,
/// which is the migration path for documents written by older gateways.
///
/// The id is a decimal string to protect 64-bit identities from JSON
/// consumers that truncate large integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDevice {
    /// Device identity as a decimal string
    pub id: String,
    /// Friendly name
    pub name: String,
    /// Location string
    pub location: String,
    /// Sensor kind token (absent in the minimal layout)
    #[serde(default)]
    pub sensor_kind: Option<String>,
    /// Unix seconds of the last reception
    #[serde(default)]
    pub last_seen: u64,
    /// Total frames received from this device
    #[serde(default)]
    pub packet_count: u64,
    /// RSSI of the last reception, dBm
    #[serde(default)]
    pub rssi: i16,
    /// SNR of the last reception, dB
    #[serde(default)]
    pub snr: i8,
}

/// Durable storage for the device registry.
///
/// Implementations must be cheap to clone (`Arc`-shared) and thread-safe;
/// the registry calls `save` from inside either pipeline.
pub trait RegistryStore: Clone + Send + Sync + 'static {
    /// Overwrite the full persistence document.
    fn save(&self, devices: &[PersistedDevice]) -> Result<(), StoreError>;

    /// Load the persistence document. An absent document is an empty list.
    fn load(&self) -> Result<Vec<PersistedDevice>, StoreError>;
}
