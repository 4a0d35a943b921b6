//! Frame type combining event name and payload.
//!
//! Layout on the wire:
//! `[FrameHeader: 8 bytes] + [event name: event_len bytes] + [payload]`
//!
//! This is a pure data holder. For typed access see
//! [`crate::InboundEvent::from_frame`] and [`crate::OutboundEvent::into_frame`].

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame (transport layer)
///
/// Holds the raw CBOR payload, not a typed event, so the transport can move
/// frames without deserializing them.
///
/// # Invariants
///
/// - Event name is 1..=[`FrameHeader::MAX_EVENT_LEN`] bytes of UTF-8.
/// - Payload is at most [`FrameHeader::MAX_PAYLOAD_SIZE`] bytes.
///
/// Both are enforced by [`Frame::encode`] and [`Frame::decode`], not by
/// [`Frame::new`], so tests can build oversized frames on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name (e.g. `chat:new-message`)
    pub event: String,

    /// Raw payload bytes (already CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(event: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { event: event.into(), payload: payload.into() }
    }

    /// Header describing this frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidEventName` if the event name is empty or longer
    ///   than [`FrameHeader::MAX_EVENT_LEN`]
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds the limit
    pub fn header(&self) -> Result<FrameHeader> {
        let event_len = self.event.len();
        if event_len == 0 || event_len > FrameHeader::MAX_EVENT_LEN {
            return Err(ProtocolError::InvalidEventName(format!("length {event_len}")));
        }

        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        // Both lengths were bounds-checked above.
        Ok(FrameHeader::new(event_len as u8, self.payload.len() as u32))
    }

    /// Encode frame into buffer.
    ///
    /// # Errors
    ///
    /// Same as [`Frame::header`].
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let header = self.header()?;

        dst.put_slice(&header.to_bytes());
        dst.put_slice(self.event.as_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Total length of the frame at the start of `bytes`, if the header is
    /// complete. `Ok(None)` means more bytes are needed.
    ///
    /// # Errors
    ///
    /// Header validation errors from [`FrameHeader::from_bytes`].
    pub fn wire_len(bytes: &[u8]) -> Result<Option<usize>> {
        if bytes.len() < FrameHeader::SIZE {
            return Ok(None);
        }
        Ok(Some(FrameHeader::from_bytes(bytes)?.frame_len()))
    }

    /// Decode frame from wire format.
    ///
    /// Does NOT deserialize the payload. Trailing bytes after the frame are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - Header validation errors from [`FrameHeader::from_bytes`]
    /// - `ProtocolError::FrameTruncated` if the body is shorter than claimed
    /// - `ProtocolError::InvalidEventName` if the event name is not UTF-8
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let event_end = FrameHeader::SIZE + header.event_len();
        let total_size = header.frame_len();

        let Some(body) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: total_size - FrameHeader::SIZE,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        let (event_bytes, payload) = body.split_at(event_end - FrameHeader::SIZE);
        let event = std::str::from_utf8(event_bytes)
            .map_err(|e| ProtocolError::InvalidEventName(e.to_string()))?
            .to_owned();

        Ok(Self { event, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_with_payload() {
        let frame = Frame::new("join-room", vec![1, 2, 3, 4]);

        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");
        assert_eq!(wire.len(), FrameHeader::SIZE + 9 + 4);
        assert_eq!(Frame::wire_len(&wire), Ok(Some(wire.len())));

        let parsed = Frame::decode(&wire).expect("should decode");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new("rate_limit", vec![0u8; 100]);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let result = Frame::decode(&wire[..FrameHeader::SIZE + 20]);
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn reject_empty_event_on_encode() {
        let frame = Frame::new("", Vec::new());
        let mut wire = Vec::new();
        assert!(matches!(frame.encode(&mut wire), Err(ProtocolError::InvalidEventName(_))));
        assert!(wire.is_empty());
    }

    #[test]
    fn reject_non_utf8_event_name() {
        let mut wire = FrameHeader::new(2, 0).to_bytes().to_vec();
        wire.extend_from_slice(&[0xC3, 0x28]);
        assert!(matches!(Frame::decode(&wire), Err(ProtocolError::InvalidEventName(_))));
    }

    #[test]
    fn wire_len_needs_full_header() {
        assert_eq!(Frame::wire_len(&[0x53, 0x4C]), Ok(None));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = Frame::new("connect", Vec::new());
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        wire.extend_from_slice(b"next frame");

        assert_eq!(Frame::decode(&wire).unwrap(), frame);
    }
}
