//! Streamline wire protocol
//!
//! Frame envelope and typed events exchanged between a Streamline client and
//! the realtime server.
//!
//! # Layers
//!
//! - [`FrameHeader`]: fixed 8-byte binary header (Big Endian)
//! - [`Frame`]: header + event name + raw payload bytes
//! - [`InboundEvent`] / [`OutboundEvent`]: typed events, CBOR payloads
//!
//! Transport lifecycle signals (`connect`, `connect_error`, `disconnect`) are
//! not frames; they are produced by the transport itself and live in the
//! client crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod event;
pub mod frame;
pub mod header;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use event::{InboundEvent, OutboundEvent};
pub use frame::Frame;
pub use header::FrameHeader;
pub use payloads::{
    chat::{
        ChatMessage, DeleteMessageRequest, MessageDeleted, MessageId, MessageType, NewMessage,
        SendMessageRequest, SlowModeToggle, UserBanned, UserId,
    },
    session::{Handshake, Notice, RoomRequest},
    stream::{StreamId, StreamRecord, StreamRef, ViewerCountUpdate},
};
