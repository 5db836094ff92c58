//! Typed frame payloads.
//!
//! The header's message type selects the payload variant; the payload bytes
//! carry no discriminator of their own. Fixed-size variants (READINGS,
//! STATUS, ACK) must match their wire layout exactly; variable-size variants
//! (EVENT, COMMAND) carry an embedded length that must agree with the byte
//! count.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one [`MessageType`].
//! - `decode(kind, encode(p)) == p` for every payload.

mod ack;
mod command;
mod event;
mod telemetry;

pub use ack::AckPayload;
pub use command::{CommandPayload, CommandType};
pub use event::{EVENT_STARTUP, EventPayload, Severity};
pub use telemetry::{PressureTrend, ReadingsPayload, StatusPayload};

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

/// All payload variants, selected by the header message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Periodic sensor readings
    Readings(ReadingsPayload),
    /// Device status report
    Status(StatusPayload),
    /// Asynchronous device event
    Event(EventPayload),
    /// Bridge-to-node command
    Command(CommandPayload),
    /// Reception acknowledgement
    Ack(AckPayload),
}

impl Payload {
    /// Decode the payload variant selected by `kind`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PayloadSizeMismatch`] when the byte count does not
    /// fit the variant's layout, [`ProtocolError::InvalidFieldValue`] for
    /// out-of-range enumerated fields.
    pub fn decode(kind: MessageType, bytes: &[u8]) -> Result<Self> {
        match kind {
            MessageType::Readings => ReadingsPayload::decode(bytes).map(Self::Readings),
            MessageType::Status => StatusPayload::decode(bytes).map(Self::Status),
            MessageType::Event => EventPayload::decode(bytes).map(Self::Event),
            MessageType::Command => CommandPayload::decode(bytes).map(Self::Command),
            MessageType::Ack => AckPayload::decode(bytes).map(Self::Ack),
        }
    }

    /// The message type this payload travels under.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Readings(_) => MessageType::Readings,
            Self::Status(_) => MessageType::Status,
            Self::Event(_) => MessageType::Event,
            Self::Command(_) => MessageType::Command,
            Self::Ack(_) => MessageType::Ack,
        }
    }

    /// Serialize the payload to its wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Readings(p) => p.encode().to_vec(),
            Self::Status(p) => p.encode().to_vec(),
            Self::Event(p) => p.encode(),
            Self::Command(p) => p.encode(),
            Self::Ack(p) => p.encode().to_vec(),
        }
    }
}

/// Reject payloads whose length differs from a fixed wire size.
fn require_exact(kind: MessageType, expected: usize, actual: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ProtocolError::PayloadSizeMismatch { kind, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_dispatches_on_message_type() {
        let readings = ReadingsPayload::default().encode();
        assert!(matches!(
            Payload::decode(MessageType::Readings, &readings),
            Ok(Payload::Readings(_))
        ));
        // Same bytes under a fixed-size variant of a different width fail.
        assert!(matches!(
            Payload::decode(MessageType::Ack, &readings),
            Err(ProtocolError::PayloadSizeMismatch { kind: MessageType::Ack, .. })
        ));
    }

    #[test]
    fn encode_matches_variant_codec() {
        let payload = Payload::Ack(AckPayload {
            ack_sequence: 9,
            success: true,
            error_code: 0,
            rssi_dbm: -90,
            snr_db: 7,
        });
        let bytes = payload.encode();
        assert_eq!(Payload::decode(MessageType::Ack, &bytes).unwrap(), payload);
        assert_eq!(payload.message_type(), MessageType::Ack);
    }
}
