//! Radio abstraction: driver trait, state machine and exclusive arbiter.
//!
//! The physical LoRa driver is a deployment collaborator; the bridge only
//! sees the [`RadioDriver`] trait. The externally observable state machine
//! is explicit:
//!
//! ```text
//! INIT ── begin ──▶ STANDBY ── start_receive ──▶ RX
//! RX ── standby ──▶ STANDBY ── transmit ──▶ TX_BUSY ──▶ STANDBY
//! any error ──▶ STANDBY (retry allowed)
//! ```
//!
//! There is no terminal state; the radio runs continuously. Holders of the
//! arbiter leave the radio in continuous receive when they release, unless
//! the next holder explicitly takes over.

mod arbiter;
mod sim;

pub use arbiter::RadioArbiter;
pub use sim::{SimulatedRadio, SimulatedRadioHandle};

use std::time::Duration;

use thiserror::Error;

/// Observable radio state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Powered but not configured
    Init,
    /// Configured, idle, accepting mode changes
    Standby,
    /// Continuous receive
    Rx,
    /// Transmission in flight
    TxBusy,
}

/// One frame pulled out of the radio's receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Raw frame bytes as received
    pub bytes: Vec<u8>,
    /// Reception RSSI, dBm
    pub rssi_dbm: i16,
    /// Reception SNR, dB
    pub snr_db: i8,
}

/// Errors from radio operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The arbiter could not be acquired within the timeout.
    #[error("radio busy: arbiter not acquired within {0:?}")]
    Busy(Duration),

    /// The BUSY line did not clear before transmission.
    #[error("radio busy line stuck for {0:?}")]
    BusyLine(Duration),

    /// Transmission failed.
    #[error("transmit failed: {0}")]
    Tx(String),

    /// Receive-path failure.
    #[error("receive failed: {0}")]
    Rx(String),

    /// Operation not legal in the current state.
    #[error("cannot {operation} from {state:?}")]
    InvalidState {
        /// State the radio was in
        state: RadioState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Driver contract for the radio hardware.
///
/// Synchronous on purpose: every call is a short register-level operation,
/// and the single [`RadioArbiter`] lock already serializes access. On any
/// error the driver must leave the radio in `Standby` so a retry can
/// restart receive.
pub trait RadioDriver: Send + 'static {
    /// Current observable state.
    fn state(&self) -> RadioState;

    /// True when a received frame is waiting in the radio buffer.
    fn data_ready(&mut self) -> bool;

    /// Pull the next received frame, if any.
    fn read_frame(&mut self) -> Result<Option<ReceivedFrame>, RadioError>;

    /// Enter standby from any state.
    fn standby(&mut self) -> Result<(), RadioError>;

    /// Enter continuous receive. Legal from `Standby` only.
    fn start_receive(&mut self) -> Result<(), RadioError>;

    /// Transmit a frame. Legal from `Standby` only; returns with the radio
    /// back in `Standby`.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), RadioError>;

    /// Wait for the BUSY line to clear before a mode change.
    fn wait_busy_clear(&mut self, timeout: Duration) -> Result<(), RadioError>;
}
