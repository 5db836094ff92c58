//! COMMAND payload: bridge-to-node control messages.

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

/// Command-type bytes understood by the sensor firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Recalibrate the pressure sensor
    Calibrate = 0x01,
    /// Set the sea-level pressure baseline (decimal hPa parameter)
    SetBaseline = 0x02,
    /// Clear the pressure baseline
    ClearBaseline = 0x03,
    /// Restart the device
    Restart = 0x04,
    /// Request an immediate STATUS report
    ReportStatus = 0x05,
    /// Set the deep-sleep duration in seconds (0 disables deep sleep)
    SetSleep = 0x06,
    /// Set the sensor read interval in seconds
    SetInterval = 0x07,
}

impl CommandType {
    /// Decode from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Calibrate),
            0x02 => Some(Self::SetBaseline),
            0x03 => Some(Self::ClearBaseline),
            0x04 => Some(Self::Restart),
            0x05 => Some(Self::ReportStatus),
            0x06 => Some(Self::SetSleep),
            0x07 => Some(Self::SetInterval),
            _ => None,
        }
    }

    /// Wire byte for this command type.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Variable-size command payload.
///
/// ```text
/// offset  size  field
/// 0       1     command type
/// 1       1     parameter length N
/// 2       N     parameter bytes, ASCII decimal (no trailing NUL)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload {
    /// Command type byte (kept raw so unknown commands pass through codecs)
    pub command: u8,
    /// ASCII-decimal parameter bytes; empty for parameter-less commands
    pub params: Vec<u8>,
}

impl CommandPayload {
    /// Minimum wire size (no parameters).
    pub const MIN_SIZE: usize = 2;

    /// Build a payload for a known command type.
    #[must_use]
    pub fn new(command: CommandType, params: Vec<u8>) -> Self {
        Self { command: command.to_u8(), params }
    }

    /// Serialize to the wire layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let len = self.params.len().min(u8::MAX as usize);
        let mut bytes = Vec::with_capacity(Self::MIN_SIZE + len);
        bytes.push(self.command);
        bytes.push(len as u8);
        bytes.extend_from_slice(&self.params[..len]);
        bytes
    }

    /// Decode from the wire layout.
    ///
    /// The embedded parameter length must match the remaining byte count
    /// exactly.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::MIN_SIZE {
            return Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Command,
                expected: Self::MIN_SIZE,
                actual: bytes.len(),
            });
        }

        let declared = usize::from(bytes[1]);
        if bytes.len() != Self::MIN_SIZE + declared {
            return Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Command,
                expected: Self::MIN_SIZE + declared,
                actual: bytes.len(),
            });
        }

        Ok(Self { command: bytes[0], params: bytes[2..].to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_params() {
        let payload = CommandPayload::new(CommandType::SetInterval, b"120".to_vec());
        let decoded = CommandPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.command, 0x07);
        assert_eq!(decoded.params, b"120");
    }

    #[test]
    fn round_trip_parameterless() {
        let payload = CommandPayload::new(CommandType::Restart, Vec::new());
        let wire = payload.encode();
        assert_eq!(wire, vec![0x04, 0x00]);
        assert_eq!(CommandPayload::decode(&wire).unwrap(), payload);
    }

    #[test]
    fn reject_below_minimum() {
        assert!(matches!(
            CommandPayload::decode(&[0x04]),
            Err(ProtocolError::PayloadSizeMismatch { kind: MessageType::Command, .. })
        ));
    }

    #[test]
    fn reject_length_mismatch() {
        let bytes = [0x07, 0x04, b'9', b'0'];
        assert_eq!(
            CommandPayload::decode(&bytes),
            Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Command,
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn command_type_round_trip() {
        for byte in 0x01..=0x07 {
            let kind = CommandType::from_u8(byte).unwrap();
            assert_eq!(kind.to_u8(), byte);
        }
        assert_eq!(CommandType::from_u8(0x00), None);
        assert_eq!(CommandType::from_u8(0x08), None);
    }
}
