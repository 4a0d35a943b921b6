//! Chat payloads.
//!
//! Inbound chat events carry the stream they belong to, so one connection can
//! serve chats for several joined streams.

use serde::{Deserialize, Serialize};

use super::stream::StreamId;

/// User identifier.
pub type UserId = String;

/// Message identifier (server-assigned).
pub type MessageId = String;

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// `/me`-style action.
    Action,
    /// Bot or moderator command.
    Command,
}

/// A chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Author.
    pub user_id: UserId,
    /// Message text.
    pub content: String,
    /// Message kind.
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    /// Send time reported by the server (milliseconds since Unix epoch).
    pub timestamp: u64,
}

/// `chat:new-message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Stream the message was posted in.
    pub stream_id: StreamId,
    /// The message.
    pub message: ChatMessage,
}

/// `chat:message-deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    /// Stream the message was posted in.
    pub stream_id: StreamId,
    /// Deleted message.
    pub message_id: MessageId,
}

/// `chat:user-banned`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBanned {
    /// Stream the ban applies to.
    pub stream_id: StreamId,
    /// Banned user.
    pub user_id: UserId,
}

/// `chat:slow-mode-toggle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowModeToggle {
    /// Stream the directive applies to.
    pub stream_id: StreamId,
    /// Whether slow mode is on.
    pub enabled: bool,
    /// Cooldown between messages, in seconds.
    #[serde(default)]
    pub duration: u32,
}

/// `chat:send-message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Target stream.
    pub stream_id: StreamId,
    /// Message text (trimmed).
    pub content: String,
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Client send time (milliseconds since Unix epoch).
    pub timestamp: u64,
}

/// `chat:delete-message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    /// Stream the message was posted in.
    pub stream_id: StreamId,
    /// Message to delete.
    pub message_id: MessageId,
}
