//! Error types for the radio wire protocol.
//!
//! Every way a frame can fail to decode is enumerated here. The receive
//! pipeline counts all of these as dropped frames; none of them abort the
//! bridge.

use thiserror::Error;

use crate::MessageType;

/// Result alias for protocol operations.
pub type Result<T> = core::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding radio frames.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the fixed header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes received
        actual: usize,
    },

    /// Magic bytes do not identify this protocol family.
    #[error("bad magic bytes")]
    BadMagic,

    /// Protocol version is not supported.
    #[error("unsupported protocol version: {0:#04x}")]
    BadVersion(u8),

    /// Header XOR checksum mismatch.
    #[error("bad header checksum: computed {expected:#04x}, frame carries {actual:#04x}")]
    BadChecksum {
        /// Checksum recomputed over the received header bytes
        expected: u8,
        /// Checksum byte carried in the frame
        actual: u8,
    },

    /// Message type byte is not a known variant.
    #[error("unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// Declared payload length exceeds the protocol maximum.
    #[error("payload too large: {size} bytes, max {max}")]
    PayloadTooLarge {
        /// Declared payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Fewer payload bytes received than the header declares.
    #[error("truncated frame: header declares {expected} payload bytes, got {actual}")]
    Truncated {
        /// Payload length declared in the header
        expected: usize,
        /// Payload bytes actually present
        actual: usize,
    },

    /// Payload length does not match the variant's wire layout.
    #[error("payload size mismatch for {kind:?}: requires {expected} bytes, got {actual}")]
    PayloadSizeMismatch {
        /// Message type selecting the payload variant
        kind: MessageType,
        /// Required size (fixed size, or minimum for variable variants)
        expected: usize,
        /// Received payload size
        actual: usize,
    },

    /// A payload field carries a value outside its enumerated range.
    #[error("invalid value {value:#04x} for field `{field}`")]
    InvalidFieldValue {
        /// Field name in the wire layout
        field: &'static str,
        /// Offending byte
        value: u8,
    },
}
