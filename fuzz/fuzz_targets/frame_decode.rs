//! Fuzz target for Frame::decode and typed event parsing
//!
//! Arbitrary bytes are decoded as a frame, then parsed as both inbound and
//! outbound events. Looks for:
//! - Parser panics on truncated or oversized headers
//! - Length arithmetic overflows
//! - CBOR payloads that crash deserialization
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use streamline_proto::{Frame, InboundEvent, OutboundEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    // A decoded frame re-encodes to the bytes it came from.
    let mut buf = Vec::new();
    frame.encode(&mut buf).expect("decoded frame must re-encode");
    assert_eq!(&buf[..], &data[..buf.len()]);

    let _ = InboundEvent::from_frame(&frame);
    let _ = OutboundEvent::from_frame(&frame);
});
