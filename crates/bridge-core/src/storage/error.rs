//! Registry store errors.

use thiserror::Error;

/// Errors from a [`RegistryStore`](super::RegistryStore) implementation.
///
/// All of them are recoverable: the registry logs the failure and keeps its
/// in-memory state authoritative.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying I/O failed (disk, filesystem).
    #[error("store i/o error: {0}")]
    Io(String),

    /// The document could not be serialized or parsed.
    #[error("store serialization error: {0}")]
    Serialization(String),
}
