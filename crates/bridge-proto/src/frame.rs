//! Frame type combining header and payload bytes.
//!
//! A `Frame` is the complete radio packet: the 16-byte header followed by
//! `payload_len` payload bytes. It holds raw bytes, not the [`Payload`]
//! enum, since the receive pipeline validates framing before paying for payload
//! decoding.
//!
//! [`Payload`]: crate::Payload

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete radio frame.
///
/// # Invariants
///
/// - `payload.len()` always matches `header.payload_len`; [`Frame::new`]
///   enforces this at construction and [`Frame::decode`] verifies it against
///   the received byte count.
/// - `payload.len()` never exceeds [`FrameHeader::MAX_PAYLOAD`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Validated frame header
    pub header: FrameHeader,
    /// Raw payload bytes (exactly `header.payload_len` of them)
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, fixing up the header's declared payload length.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`FrameHeader::MAX_PAYLOAD`].
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > FrameHeader::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: FrameHeader::MAX_PAYLOAD,
            });
        }
        header.payload_len = payload.len() as u8;
        Ok(Self { header, payload })
    }

    /// Total size of the frame on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode the frame into `dst`: `[header][payload]`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert_eq!(self.payload.len(), usize::from(self.header.payload_len));
        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
    }

    /// Encode the frame into a fresh buffer.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        self.encode(&mut wire);
        wire
    }

    /// Decode a frame from wire bytes.
    ///
    /// Trailing bytes beyond the declared payload length are ignored; the
    /// radio hands over its full receive buffer.
    ///
    /// # Errors
    ///
    /// Any header validation error from [`FrameHeader::from_bytes`], or
    /// [`ProtocolError::Truncated`] when fewer payload bytes are present
    /// than the header declares.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_len = usize::from(header.payload_len);
        let available = bytes.len() - FrameHeader::SIZE;
        if available < payload_len {
            return Err(ProtocolError::Truncated { expected: payload_len, actual: available });
        }

        let payload =
            Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..FrameHeader::SIZE + payload_len]);

        debug_assert_eq!(payload.len(), payload_len);

        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceId, MessageType};

    fn header(kind: MessageType) -> FrameHeader {
        FrameHeader::new(kind, DeviceId(0x1122_3344_5566_7788), 42)
    }

    #[test]
    fn round_trip_with_payload() {
        let frame = Frame::new(header(MessageType::Event), vec![9, 8, 7]).unwrap();
        assert_eq!(frame.header.payload_len, 3);

        let parsed = Frame::decode(&frame.to_vec()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = Frame::new(header(MessageType::Event), vec![1, 2]).unwrap();
        let mut wire = frame.to_vec();
        wire.extend_from_slice(&[0xEE; 40]);

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed.payload.as_ref(), &[1, 2]);
    }

    #[test]
    fn reject_truncated_payload() {
        let frame = Frame::new(header(MessageType::Readings), vec![0u8; 20]).unwrap();
        let wire = frame.to_vec();

        let result = Frame::decode(&wire[..wire.len() - 5]);
        assert_eq!(result, Err(ProtocolError::Truncated { expected: 20, actual: 15 }));
    }

    #[test]
    fn max_payload_encodes_and_decodes() {
        let frame =
            Frame::new(header(MessageType::Event), vec![0xAB; FrameHeader::MAX_PAYLOAD]).unwrap();
        let parsed = Frame::decode(&frame.to_vec()).unwrap();
        assert_eq!(parsed.payload.len(), FrameHeader::MAX_PAYLOAD);
    }

    #[test]
    fn reject_payload_over_max() {
        let result = Frame::new(header(MessageType::Event), vec![0u8; 239]);
        assert_eq!(result, Err(ProtocolError::PayloadTooLarge { size: 239, max: 238 }));
    }
}
