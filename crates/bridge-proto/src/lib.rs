//! Wire protocol for the LoRa sensor bridge.
//!
//! Defines the binary radio frame exchanged with the sensor nodes: a fixed
//! 16-byte header (magic, version, message type, device identity, sequence
//! number, payload length, XOR checksum) followed by a typed payload.
//!
//! The codec is pure: no I/O, no shared state, and every failure mode is an
//! enumerated [`ProtocolError`]. All multi-byte scalars are little-endian to
//! match the sensor firmware. Parsing is explicit and byte-wise, with no
//! struct overlays, so the wire layout is independent of host alignment and
//! padding.

mod errors;
mod frame;
mod header;
pub mod payloads;

use std::fmt;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use payloads::{
    AckPayload, CommandPayload, CommandType, EVENT_STARTUP, EventPayload, Payload, PressureTrend,
    ReadingsPayload, Severity, StatusPayload,
};

/// 64-bit identity of a sensor node.
///
/// Carried in every frame. Rendered as a 16-character uppercase hex token on
/// all external interfaces (broker topics, admin surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// External representation: 16 uppercase hex characters.
    #[must_use]
    pub fn hex(&self) -> String {
        format!("{:016X}", self.0)
    }

    /// Default friendly name derived from the low 32 bits of the identity.
    ///
    /// Used until the device reports its own name in a STATUS frame.
    #[must_use]
    pub fn short_name(&self) -> String {
        format!("sensor_{:08x}", self.0 as u32)
    }

    /// Parse the external 16-hex-character representation.
    ///
    /// Accepts both cases. Returns `None` for any other shape.
    #[must_use]
    pub fn from_hex(token: &str) -> Option<Self> {
        if token.len() != 16 {
            return None;
        }
        u64::from_str_radix(token, 16).ok().map(Self)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Frame message type, carried as one byte in the header.
///
/// Selects the payload variant. Unknown bytes fail header parsing with
/// [`ProtocolError::UnknownMessageType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Periodic sensor readings (node → bridge)
    Readings = 0x01,
    /// Device status report (node → bridge)
    Status = 0x02,
    /// Asynchronous device event (node → bridge)
    Event = 0x03,
    /// Queued command (bridge → node)
    Command = 0x04,
    /// Reception acknowledgement (bridge → node)
    Ack = 0x05,
}

impl MessageType {
    /// Decode from the header byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Readings),
            0x02 => Some(Self::Status),
            0x03 => Some(Self::Event),
            0x04 => Some(Self::Command),
            0x05 => Some(Self::Ack),
            _ => None,
        }
    }

    /// Header byte for this message type.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
