//! Domain state for the LoRa sensor bridge.
//!
//! Owns the pieces both pipelines share: the bounded device registry with
//! its per-device deduplication rings, the coalescing command queue, the
//! decoded-record type that travels between the receive and publish paths,
//! and the aggregate pipeline counters.
//!
//! Everything here is synchronous and internally serialized: state lives
//! behind short-critical-section locks and all clocks are caller-passed, so
//! the types drop into deterministic tests unchanged.

mod command_queue;
mod record;
mod registry;
pub mod storage;

pub use command_queue::{CommandQueue, CommandQueueError, EnqueueOutcome, QueuedCommand};
pub use record::{CounterReport, DecodedRecord, PipelineCounters};
pub use registry::{
    DEDUP_SENTINEL, DeviceRegistry, DeviceSnapshot, RegistryError, SensorKind,
};
pub use storage::{MemoryStore, PersistedDevice, RegistryStore, StoreError};
