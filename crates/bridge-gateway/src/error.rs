//! Gateway-level error types.
//!
//! Everything below the gateway top level recovers locally; these errors
//! only surface from startup (configuration, store) and from the watchdog,
//! which is the single sanctioned way the process dies.

use thiserror::Error;

use bridge_core::StoreError;

/// Errors that can terminate gateway startup or operation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration file missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Registry store failed during startup restore.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A pipeline stopped feeding the watchdog.
    #[error("watchdog starved by task `{0}`, restarting")]
    WatchdogStarved(&'static str),

    /// A pipeline task ended unexpectedly.
    #[error("pipeline task `{0}` exited")]
    PipelineExited(&'static str),
}
