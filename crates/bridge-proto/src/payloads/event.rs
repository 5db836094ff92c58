//! EVENT payload: asynchronous device notifications.

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

/// Event type announcing a device (re)boot. Observing it resets the
/// device's deduplication ring.
pub const EVENT_STARTUP: u8 = 0x01;

/// Event severity, published to the broker by symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    /// Informational
    Info = 0,
    /// Needs attention eventually
    Warning = 1,
    /// Something failed
    Error = 2,
    /// Device is in trouble
    Critical = 3,
}

impl Severity {
    /// Decode from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Info),
            1 => Some(Self::Warning),
            2 => Some(Self::Error),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Symbolic name used in broker messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Variable-size event payload.
///
/// ```text
/// offset  size  field
/// 0       1     event type
/// 1       1     severity       0..=3
/// 2       1     message length N
/// 3       N     message bytes  UTF-8 (decoded lossily)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    /// Event type byte; only [`EVENT_STARTUP`] has bridge-side semantics,
    /// all others pass through to the broker.
    pub event_type: u8,
    /// Event severity
    pub severity: Severity,
    /// Free-form message bytes
    pub message: Vec<u8>,
}

impl EventPayload {
    /// Minimum wire size (empty message).
    pub const MIN_SIZE: usize = 3;

    /// True when this event announces a device startup.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        self.event_type == EVENT_STARTUP
    }

    /// Message text, decoded lossily.
    #[must_use]
    pub fn message_str(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }

    /// Serialize to the wire layout.
    ///
    /// The message is truncated to 255 bytes to fit the one-byte length
    /// field; frame-level limits cap it lower in practice.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let len = self.message.len().min(u8::MAX as usize);
        let mut bytes = Vec::with_capacity(Self::MIN_SIZE + len);
        bytes.push(self.event_type);
        bytes.push(self.severity as u8);
        bytes.push(len as u8);
        bytes.extend_from_slice(&self.message[..len]);
        bytes
    }

    /// Decode from the wire layout.
    ///
    /// The embedded message length must match the remaining byte count
    /// exactly.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::MIN_SIZE {
            return Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Event,
                expected: Self::MIN_SIZE,
                actual: bytes.len(),
            });
        }

        let severity = Severity::from_u8(bytes[1])
            .ok_or(ProtocolError::InvalidFieldValue { field: "severity", value: bytes[1] })?;

        let declared = usize::from(bytes[2]);
        if bytes.len() != Self::MIN_SIZE + declared {
            return Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Event,
                expected: Self::MIN_SIZE + declared,
                actual: bytes.len(),
            });
        }

        Ok(Self { event_type: bytes[0], severity, message: bytes[3..].to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let payload = EventPayload {
            event_type: EVENT_STARTUP,
            severity: Severity::Info,
            message: b"boot after deep sleep".to_vec(),
        };
        let decoded = EventPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
        assert!(decoded.is_startup());
        assert_eq!(decoded.message_str(), "boot after deep sleep");
    }

    #[test]
    fn empty_message_round_trip() {
        let payload =
            EventPayload { event_type: 0x20, severity: Severity::Critical, message: vec![] };
        let decoded = EventPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
        assert!(!decoded.is_startup());
    }

    #[test]
    fn reject_below_minimum() {
        assert!(matches!(
            EventPayload::decode(&[0x01, 0x00]),
            Err(ProtocolError::PayloadSizeMismatch { kind: MessageType::Event, .. })
        ));
    }

    #[test]
    fn reject_length_mismatch() {
        // Declares 5 message bytes, carries 3.
        let bytes = [0x01, 0x00, 0x05, b'a', b'b', b'c'];
        assert_eq!(
            EventPayload::decode(&bytes),
            Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Event,
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn reject_bad_severity() {
        let bytes = [0x01, 0x09, 0x00];
        assert_eq!(
            EventPayload::decode(&bytes),
            Err(ProtocolError::InvalidFieldValue { field: "severity", value: 0x09 })
        );
    }

    #[test]
    fn severity_names() {
        assert_eq!(Severity::Info.as_str(), "info");
        assert_eq!(Severity::Warning.as_str(), "warning");
        assert_eq!(Severity::Error.as_str(), "error");
        assert_eq!(Severity::Critical.as_str(), "critical");
    }
}
