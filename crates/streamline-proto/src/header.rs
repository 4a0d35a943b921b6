//! Frame header with zero-copy parsing.
//!
//! The header is a fixed 8-byte structure serialized as raw binary (Big
//! Endian). A reader can learn the full frame length from the header alone,
//! which is what the stream transport uses to reassemble frames.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Fixed 8-byte frame header (Big Endian network byte order)
///
/// Layout:
///
/// ```text
/// 0       2         3           4                8
/// ┌───────┬─────────┬───────────┬────────────────┐
/// │ magic │ version │ event_len │  payload_size  │
/// └───────┴─────────┴───────────┴────────────────┘
/// ```
///
/// All byte patterns are valid for the struct itself; semantic checks
/// (magic, version, size limits) happen in [`FrameHeader::from_bytes`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 2],
    version: u8,
    pub(crate) event_len: u8,
    pub(crate) payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 8;

    /// Magic number: "SL" in ASCII
    pub const MAGIC: u16 = 0x534C;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum event name length in bytes
    pub const MAX_EVENT_LEN: usize = 64;

    /// Maximum payload size (1 MiB)
    pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

    /// Create a header for the given event name and payload lengths.
    ///
    /// Lengths are stored as given; limits are enforced by
    /// [`crate::Frame::encode`].
    #[must_use]
    pub fn new(event_len: u8, payload_size: u32) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            event_len,
            payload_size: payload_size.to_be_bytes(),
        }
    }

    /// Parse header from network bytes (zero-copy).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 8 bytes are available
    /// - `ProtocolError::InvalidMagic` if magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` if version is not 0x01
    /// - `ProtocolError::InvalidEventName` if the event length is 0 or too long
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds the limit
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if u16::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let event_len = header.event_len as usize;
        if event_len == 0 || event_len > Self::MAX_EVENT_LEN {
            return Err(ProtocolError::InvalidEventName(format!("length {event_len}")));
        }

        let payload_size = header.payload_size();
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Length of the event name in bytes.
    #[must_use]
    pub fn event_len(&self) -> usize {
        self.event_len as usize
    }

    /// Length of the CBOR payload in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Total frame length on the wire (header + event name + payload).
    #[must_use]
    pub fn frame_len(&self) -> usize {
        Self::SIZE + self.event_len() + self.payload_size() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn parse_valid_header() {
        let header = FrameHeader::new(9, 42);
        let bytes = header.to_bytes();

        let parsed = FrameHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.event_len(), 9);
        assert_eq!(parsed.payload_size(), 42);
        assert_eq!(parsed.frame_len(), 8 + 9 + 42);
    }

    #[test]
    fn reject_bad_magic() {
        let mut bytes = FrameHeader::new(4, 0).to_bytes();
        bytes[0] = 0xFF;
        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn reject_unknown_version() {
        let mut bytes = FrameHeader::new(4, 0).to_bytes();
        bytes[2] = 0x07;
        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::UnsupportedVersion(7)));
    }

    #[test]
    fn reject_empty_event_name() {
        let bytes = FrameHeader::new(0, 0).to_bytes();
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::InvalidEventName(_))));
    }

    #[test]
    fn reject_oversized_payload() {
        let bytes = FrameHeader::new(4, FrameHeader::MAX_PAYLOAD_SIZE + 1).to_bytes();
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn reject_short_buffer() {
        let result = FrameHeader::from_bytes(&[0x53, 0x4C, 0x01]);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 8, actual: 3 }));
    }
}
