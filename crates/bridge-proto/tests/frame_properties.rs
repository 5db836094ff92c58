//! Property-based tests for frame encoding/decoding.
//!
//! Verifies the codec laws for all inputs, not just examples: round-trip
//! identity, single-byte header corruption always detected, and boundary
//! behavior at the payload cap.

use bridge_proto::{
    AckPayload, CommandPayload, DeviceId, EventPayload, Frame, FrameHeader, MessageType, Payload,
    PressureTrend, ProtocolError, ReadingsPayload, Severity, StatusPayload,
};
use proptest::prelude::{Just, Strategy, any, prop, prop_assert, prop_assert_eq, prop_oneof, proptest};

fn arbitrary_message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Readings),
        Just(MessageType::Status),
        Just(MessageType::Event),
        Just(MessageType::Command),
        Just(MessageType::Ack),
    ]
}

fn arbitrary_header() -> impl Strategy<Value = FrameHeader> {
    (arbitrary_message_type(), any::<u64>(), any::<u16>()).prop_map(
        |(message_type, device_id, sequence)| {
            FrameHeader::new(message_type, DeviceId(device_id), sequence)
        },
    )
}

fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (arbitrary_header(), prop::collection::vec(any::<u8>(), 0..=FrameHeader::MAX_PAYLOAD))
        .prop_map(|(header, payload)| Frame::new(header, payload).unwrap())
}

fn arbitrary_trend() -> impl Strategy<Value = PressureTrend> {
    prop_oneof![
        Just(PressureTrend::Falling),
        Just(PressureTrend::Steady),
        Just(PressureTrend::Rising)
    ]
}

fn arbitrary_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Warning),
        Just(Severity::Error),
        Just(Severity::Critical)
    ]
}

fn arbitrary_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        (
            any::<i16>(),
            any::<u16>(),
            any::<u32>(),
            any::<i16>(),
            any::<u16>(),
            any::<u8>(),
            any::<i16>(),
            arbitrary_trend(),
            any::<u32>(),
        )
            .prop_map(
                |(t, h, p, alt, mv, pct, delta, trend, ts)| {
                    Payload::Readings(ReadingsPayload {
                        temperature_centi: t,
                        humidity_centi: h,
                        pressure_centi: p,
                        altitude_m: alt,
                        battery_mv: mv,
                        battery_percent: pct,
                        pressure_change_centi: delta,
                        trend,
                        timestamp: ts,
                    })
                }
            ),
        (any::<[u8; 16]>(), any::<[u8; 16]>(), any::<u32>(), any::<u16>(), any::<u16>()).prop_map(
            |(name, location, uptime, ri, ds)| {
                Payload::Status(StatusPayload {
                    name,
                    location,
                    uptime_s: uptime,
                    read_interval_s: ri,
                    deep_sleep_s: ds,
                    ..StatusPayload::default()
                })
            }
        ),
        (any::<u8>(), arbitrary_severity(), prop::collection::vec(any::<u8>(), 0..200)).prop_map(
            |(event_type, severity, message)| {
                Payload::Event(EventPayload { event_type, severity, message })
            }
        ),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(command, params)| Payload::Command(CommandPayload { command, params })),
        (any::<u16>(), any::<bool>(), any::<u8>(), any::<i16>(), any::<i8>()).prop_map(
            |(seq, success, code, rssi, snr)| {
                Payload::Ack(AckPayload {
                    ack_sequence: seq,
                    success,
                    error_code: code,
                    rssi_dbm: rssi,
                    snr_db: snr,
                })
            }
        ),
    ]
}

#[test]
fn prop_frame_round_trip() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.to_vec();
        let parsed = Frame::decode(&wire).unwrap();
        prop_assert_eq!(parsed, frame);
    });
}

#[test]
fn prop_header_mutation_is_detected() {
    proptest!(|(header in arbitrary_header(), offset in 0usize..16, flip in 1u8..=255)| {
        let mut bytes = header.to_bytes();
        bytes[offset] ^= flip;

        let result = FrameHeader::from_bytes(&bytes);
        match offset {
            // Magic is validated before the checksum.
            0 | 1 => prop_assert_eq!(result, Err(ProtocolError::BadMagic)),
            // Version likewise.
            2 => prop_assert!(matches!(result, Err(ProtocolError::BadVersion(_)))),
            // Any other corrupted byte (checksum byte included) trips the XOR.
            _ => {
                let is_bad_checksum = matches!(result, Err(ProtocolError::BadChecksum { .. }));
                prop_assert!(is_bad_checksum);
            }
        }
    });
}

#[test]
fn prop_payload_round_trip() {
    proptest!(|(payload in arbitrary_payload())| {
        let wire = payload.encode();
        let parsed = Payload::decode(payload.message_type(), &wire).unwrap();
        prop_assert_eq!(parsed, payload);
    });
}

#[test]
fn prop_payload_through_frame_round_trip() {
    proptest!(|(payload in arbitrary_payload(), device_id in any::<u64>(), seq in any::<u16>())| {
        let header = FrameHeader::new(payload.message_type(), DeviceId(device_id), seq);
        let frame = Frame::new(header, payload.encode()).unwrap();

        let parsed = Frame::decode(&frame.to_vec()).unwrap();
        let decoded = Payload::decode(parsed.header.message_type, &parsed.payload).unwrap();
        prop_assert_eq!(decoded, payload);
    });
}

#[test]
fn payload_at_exact_cap_decodes_and_one_over_truncates() {
    let header = FrameHeader::new(MessageType::Event, DeviceId(1), 0);
    let frame = Frame::new(header, vec![0u8; FrameHeader::MAX_PAYLOAD]).unwrap();
    let wire = frame.to_vec();
    assert!(Frame::decode(&wire).is_ok());

    // A header declaring one more byte than present fails as truncated.
    let short = &wire[..wire.len() - 1];
    assert_eq!(
        Frame::decode(short),
        Err(ProtocolError::Truncated { expected: 238, actual: 237 })
    );
}

#[test]
fn sequence_wraps_through_sentinel_values() {
    for seq in [0xFFFEu16, 0xFFFF, 0x0000] {
        let header = FrameHeader::new(MessageType::Readings, DeviceId(7), seq);
        let parsed = FrameHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed.sequence, seq);
    }
}
