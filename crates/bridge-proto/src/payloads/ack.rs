//! ACK payload: bridge-to-node reception acknowledgement.

use crate::{MessageType, errors::Result};

use super::require_exact;

/// Fixed-size acknowledgement payload (7 bytes on the wire).
///
/// ```text
/// offset  size  field
/// 0       2     acknowledged sequence  u16
/// 2       1     success flag
/// 3       1     error code
/// 4       2     uplink RSSI            i16, dBm
/// 6       1     uplink SNR             i8, dB
/// ```
///
/// The RSSI/SNR echo lets the sensor adapt its transmit power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckPayload {
    /// Sequence number being acknowledged
    pub ack_sequence: u16,
    /// Whether the frame was accepted
    pub success: bool,
    /// Error code (0 for success)
    pub error_code: u8,
    /// RSSI at which the bridge heard the frame, dBm
    pub rssi_dbm: i16,
    /// SNR at which the bridge heard the frame, dB
    pub snr_db: i8,
}

impl AckPayload {
    /// Fixed wire size.
    pub const SIZE: usize = 7;

    /// Serialize to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.ack_sequence.to_le_bytes());
        bytes[2] = u8::from(self.success);
        bytes[3] = self.error_code;
        bytes[4..6].copy_from_slice(&self.rssi_dbm.to_le_bytes());
        bytes[6] = self.snr_db as u8;
        bytes
    }

    /// Decode from the fixed wire layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        require_exact(MessageType::Ack, Self::SIZE, bytes.len())?;

        Ok(Self {
            ack_sequence: u16::from_le_bytes([bytes[0], bytes[1]]),
            success: bytes[2] != 0,
            error_code: bytes[3],
            rssi_dbm: i16::from_le_bytes([bytes[4], bytes[5]]),
            snr_db: bytes[6] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    #[test]
    fn round_trip() {
        let payload = AckPayload {
            ack_sequence: 0xFFFE,
            success: true,
            error_code: 0,
            rssi_dbm: -101,
            snr_db: -3,
        };
        let decoded = AckPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn reject_wrong_size() {
        assert_eq!(
            AckPayload::decode(&[0u8; 8]),
            Err(ProtocolError::PayloadSizeMismatch {
                kind: MessageType::Ack,
                expected: 7,
                actual: 8
            })
        );
    }
}
