//! Property tests for frame parsing.
//!
//! The decoder sits directly behind the network, so it must reject every
//! malformed input with a structured error and never panic.

use proptest::prelude::*;
use streamline_proto::{Frame, FrameHeader, InboundEvent, ProtocolError};

fn event_name() -> impl Strategy<Value = String> {
    "[a-z][a-z:_-]{0,40}"
}

proptest! {
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes);
        let _ = Frame::wire_len(&bytes);
    }

    #[test]
    fn prop_wire_len_matches_encoded_len(
        event in event_name(),
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let frame = Frame::new(event, payload);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        prop_assert_eq!(Frame::wire_len(&wire), Ok(Some(wire.len())));
        prop_assert_eq!(Frame::decode(&wire), Ok(frame));
    }

    #[test]
    fn prop_any_truncation_is_rejected(
        event in event_name(),
        payload in prop::collection::vec(any::<u8>(), 1..128),
        cut in any::<prop::sample::Index>(),
    ) {
        let frame = Frame::new(event, payload);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let cut = cut.index(wire.len());
        let result = Frame::decode(&wire[..cut]);
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_unknown_or_garbage_inbound_is_error_not_panic(
        event in event_name(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let frame = Frame::new(event, payload);
        let _ = InboundEvent::from_frame(&frame);
    }
}

#[test]
fn oversized_payload_rejected_on_encode() {
    let frame = Frame::new("chat:new-message", vec![0u8; FrameHeader::MAX_PAYLOAD_SIZE as usize + 1]);
    let mut wire = Vec::new();
    assert!(matches!(frame.encode(&mut wire), Err(ProtocolError::PayloadTooLarge { .. })));
}

#[test]
fn event_name_at_limit_is_accepted() {
    let name = "e".repeat(FrameHeader::MAX_EVENT_LEN);
    let frame = Frame::new(name, Vec::new());
    let mut wire = Vec::new();
    frame.encode(&mut wire).unwrap();
    assert_eq!(Frame::decode(&wire).unwrap(), frame);

    let too_long = Frame::new("e".repeat(FrameHeader::MAX_EVENT_LEN + 1), Vec::new());
    assert!(matches!(too_long.encode(&mut Vec::new()), Err(ProtocolError::InvalidEventName(_))));
}
