//! Typed events.
//!
//! The frame's event name selects the payload type, so only the inner struct
//! is serialized (no variant tag in CBOR).
//!
//! # Invariants
//!
//! Each variant maps to exactly one event name (enforced by match
//! exhaustiveness in `name()` and `from_frame()`).

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader,
    errors::{ProtocolError, Result},
    payloads::{
        chat::{
            DeleteMessageRequest, MessageDeleted, NewMessage, SendMessageRequest, SlowModeToggle,
            UserBanned,
        },
        session::{Handshake, Notice, RoomRequest},
        stream::{StreamRecord, StreamRef, ViewerCountUpdate},
    },
};

/// Wire event names.
pub mod names {
    /// Credential rejected after the transport opened.
    pub const AUTH_ERROR: &str = "auth_error";
    /// Server-side rate limit hit.
    pub const RATE_LIMIT: &str = "rate_limit";
    /// A stream went live.
    pub const STREAM_STARTED: &str = "stream-started";
    /// A stream went offline.
    pub const STREAM_ENDED: &str = "stream-ended";
    /// Authoritative viewer count.
    pub const VIEWER_COUNT_UPDATE: &str = "viewer-count-update";
    /// One viewer joined.
    pub const VIEWER_JOINED: &str = "viewer-joined";
    /// One viewer left.
    pub const VIEWER_LEFT: &str = "viewer-left";
    /// New chat message.
    pub const CHAT_NEW_MESSAGE: &str = "chat:new-message";
    /// Chat message removed by a moderator.
    pub const CHAT_MESSAGE_DELETED: &str = "chat:message-deleted";
    /// User banned from chat.
    pub const CHAT_USER_BANNED: &str = "chat:user-banned";
    /// Slow mode switched on or off.
    pub const CHAT_SLOW_MODE_TOGGLE: &str = "chat:slow-mode-toggle";

    /// Credential presented on transport open.
    pub const HANDSHAKE: &str = "handshake";
    /// Subscribe to a room.
    pub const JOIN_ROOM: &str = "join-room";
    /// Unsubscribe from a room.
    pub const LEAVE_ROOM: &str = "leave-room";
    /// Post a chat message.
    pub const CHAT_SEND_MESSAGE: &str = "chat:send-message";
    /// Delete a chat message.
    pub const CHAT_DELETE_MESSAGE: &str = "chat:delete-message";
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Credential rejected.
    AuthError(Notice),
    /// Rate limit warning.
    RateLimit(Notice),
    /// Stream went live.
    StreamStarted(StreamRecord),
    /// Stream went offline.
    StreamEnded(StreamRef),
    /// Authoritative viewer count.
    ViewerCountUpdate(ViewerCountUpdate),
    /// Viewer joined (delta +1).
    ViewerJoined(StreamRef),
    /// Viewer left (delta -1).
    ViewerLeft(StreamRef),
    /// New chat message.
    NewMessage(NewMessage),
    /// Chat message deleted.
    MessageDeleted(MessageDeleted),
    /// User banned.
    UserBanned(UserBanned),
    /// Slow mode directive.
    SlowModeToggle(SlowModeToggle),
}

impl InboundEvent {
    /// Event name on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthError(_) => names::AUTH_ERROR,
            Self::RateLimit(_) => names::RATE_LIMIT,
            Self::StreamStarted(_) => names::STREAM_STARTED,
            Self::StreamEnded(_) => names::STREAM_ENDED,
            Self::ViewerCountUpdate(_) => names::VIEWER_COUNT_UPDATE,
            Self::ViewerJoined(_) => names::VIEWER_JOINED,
            Self::ViewerLeft(_) => names::VIEWER_LEFT,
            Self::NewMessage(_) => names::CHAT_NEW_MESSAGE,
            Self::MessageDeleted(_) => names::CHAT_MESSAGE_DELETED,
            Self::UserBanned(_) => names::CHAT_USER_BANNED,
            Self::SlowModeToggle(_) => names::CHAT_SLOW_MODE_TOGGLE,
        }
    }

    /// Encode into a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let payload = match &self {
            Self::AuthError(inner) | Self::RateLimit(inner) => to_cbor(inner),
            Self::StreamStarted(inner) => to_cbor(inner),
            Self::StreamEnded(inner) | Self::ViewerJoined(inner) | Self::ViewerLeft(inner) => {
                to_cbor(inner)
            },
            Self::ViewerCountUpdate(inner) => to_cbor(inner),
            Self::NewMessage(inner) => to_cbor(inner),
            Self::MessageDeleted(inner) => to_cbor(inner),
            Self::UserBanned(inner) => to_cbor(inner),
            Self::SlowModeToggle(inner) => to_cbor(inner),
        }?;
        Ok(Frame::new(self.name(), payload))
    }

    /// Parse from a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` if the event name is not an inbound
    ///   event
    /// - `ProtocolError::PayloadTooLarge` / `ProtocolError::CborDecode` on bad
    ///   payloads
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let bytes = checked_payload(frame)?;

        let event = match frame.event.as_str() {
            names::AUTH_ERROR => Self::AuthError(from_cbor(bytes)?),
            names::RATE_LIMIT => Self::RateLimit(from_cbor(bytes)?),
            names::STREAM_STARTED => Self::StreamStarted(from_cbor(bytes)?),
            names::STREAM_ENDED => Self::StreamEnded(from_cbor(bytes)?),
            names::VIEWER_COUNT_UPDATE => Self::ViewerCountUpdate(from_cbor(bytes)?),
            names::VIEWER_JOINED => Self::ViewerJoined(from_cbor(bytes)?),
            names::VIEWER_LEFT => Self::ViewerLeft(from_cbor(bytes)?),
            names::CHAT_NEW_MESSAGE => Self::NewMessage(from_cbor(bytes)?),
            names::CHAT_MESSAGE_DELETED => Self::MessageDeleted(from_cbor(bytes)?),
            names::CHAT_USER_BANNED => Self::UserBanned(from_cbor(bytes)?),
            names::CHAT_SLOW_MODE_TOGGLE => Self::SlowModeToggle(from_cbor(bytes)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_owned())),
        };

        Ok(event)
    }
}

/// Events sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Credential presented on open.
    Handshake(Handshake),
    /// Subscribe to a room.
    JoinRoom(RoomRequest),
    /// Unsubscribe from a room.
    LeaveRoom(RoomRequest),
    /// Post a chat message.
    SendMessage(SendMessageRequest),
    /// Delete a chat message.
    DeleteMessage(DeleteMessageRequest),
}

impl OutboundEvent {
    /// Event name on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Handshake(_) => names::HANDSHAKE,
            Self::JoinRoom(_) => names::JOIN_ROOM,
            Self::LeaveRoom(_) => names::LEAVE_ROOM,
            Self::SendMessage(_) => names::CHAT_SEND_MESSAGE,
            Self::DeleteMessage(_) => names::CHAT_DELETE_MESSAGE,
        }
    }

    /// `join-room` request for `room_id`.
    pub fn join_room(room_id: impl Into<String>) -> Self {
        Self::JoinRoom(RoomRequest { room_id: room_id.into() })
    }

    /// `leave-room` request for `room_id`.
    pub fn leave_room(room_id: impl Into<String>) -> Self {
        Self::LeaveRoom(RoomRequest { room_id: room_id.into() })
    }

    /// Encode into a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let payload = match &self {
            Self::Handshake(inner) => to_cbor(inner),
            Self::JoinRoom(inner) | Self::LeaveRoom(inner) => to_cbor(inner),
            Self::SendMessage(inner) => to_cbor(inner),
            Self::DeleteMessage(inner) => to_cbor(inner),
        }?;
        Ok(Frame::new(self.name(), payload))
    }

    /// Parse from a transport frame (server side and tests).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` if the event name is not an outbound
    ///   event
    /// - `ProtocolError::PayloadTooLarge` / `ProtocolError::CborDecode` on bad
    ///   payloads
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let bytes = checked_payload(frame)?;

        let event = match frame.event.as_str() {
            names::HANDSHAKE => Self::Handshake(from_cbor(bytes)?),
            names::JOIN_ROOM => Self::JoinRoom(from_cbor(bytes)?),
            names::LEAVE_ROOM => Self::LeaveRoom(from_cbor(bytes)?),
            names::CHAT_SEND_MESSAGE => Self::SendMessage(from_cbor(bytes)?),
            names::CHAT_DELETE_MESSAGE => Self::DeleteMessage(from_cbor(bytes)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_owned())),
        };

        Ok(event)
    }
}

/// Size check happens before CBOR parsing so the parser never sees oversized
/// input.
fn checked_payload(frame: &Frame) -> Result<&[u8]> {
    if frame.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
        return Err(ProtocolError::PayloadTooLarge {
            size: frame.payload.len(),
            max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
        });
    }
    Ok(&frame.payload)
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(Bytes::from(buf))
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
