//! Client events, actions, and notifications.

use std::time::Duration;

use streamline_core::{
    ConnectionError, ConnectionState, RateLimitWarning, SlowModeState, TimerId, Token,
};
use streamline_proto::{ChatMessage, Frame, MessageId, MessageType, StreamId, StreamRecord, UserId};

use crate::error::ClientError;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle (`Connected`, `ConnectError`,
///   `Disconnected`)
/// - Receiving frames from the network
/// - Firing timers it was asked to schedule
/// - Forwarding application intents (join, send, block, etc.)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Transport opened and the handshake was accepted.
    Connected,

    /// Transport open failed.
    ConnectError {
        /// Transport error message.
        message: String,
    },

    /// Transport closed.
    Disconnected {
        /// Reason reported by the transport.
        reason: String,
    },

    /// Frame received from server.
    FrameReceived(Frame),

    /// A timer scheduled via [`ClientAction::ScheduleTimer`] fired.
    TimerFired(TimerId),

    /// Application wants to connect with this credential.
    Connect(Token),

    /// Application wants to disconnect.
    Disconnect,

    /// Externally observed credential changed (or was re-observed).
    CredentialChanged(Option<Token>),

    /// Signed-in user changed.
    IdentityChanged(Option<UserId>),

    /// Application wants to watch a stream.
    JoinStream {
        /// Stream to join.
        stream_id: StreamId,
    },

    /// Application stops watching a stream.
    LeaveStream {
        /// Stream to leave.
        stream_id: StreamId,
    },

    /// Application wants to post a chat message.
    SendMessage {
        /// Target stream.
        stream_id: StreamId,
        /// Untrimmed message text.
        content: String,
        /// Message kind.
        kind: MessageType,
    },

    /// Moderator wants to delete a message.
    DeleteMessage {
        /// Stream the message was posted in.
        stream_id: StreamId,
        /// Message to delete.
        message_id: MessageId,
    },

    /// Hide a user's messages locally.
    Block {
        /// User to block.
        user_id: UserId,
    },

    /// Stop hiding a user's messages.
    Unblock {
        /// User to unblock.
        user_id: UserId,
    },

    /// Viewport scroll position for a stream's chat.
    ReportScroll {
        /// Stream whose chat scrolled.
        stream_id: StreamId,
        /// Distance from the bottom, in pixels.
        distance_from_bottom: u32,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open the transport, presenting `credential` in the handshake.
    OpenTransport {
        /// Bearer credential.
        credential: Token,
    },

    /// Close the transport (or abort an in-flight open).
    CloseTransport,

    /// Send a frame to the server.
    Send(Frame),

    /// Fire `id` back as [`ClientEvent::TimerFired`] after `delay`.
    ScheduleTimer {
        /// Timer handle.
        id: TimerId,
        /// Delay before firing.
        delay: Duration,
    },

    /// Drop a scheduled timer without firing it.
    CancelTimer {
        /// Timer handle.
        id: TimerId,
    },

    /// Deliver a state change to subscribers.
    Notify(Notification),
}

/// State changes delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Connection state changed.
    ConnectionChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },

    /// Terminal connection error (auth, server close, exhausted retries).
    ConnectionFailed(ConnectionError),

    /// Server asked the client to slow down.
    RateLimited(RateLimitWarning),

    /// A stream went live.
    StreamStarted(StreamRecord),

    /// A stream went offline.
    StreamEnded {
        /// Stream that ended.
        stream_id: StreamId,
    },

    /// Viewer count changed.
    ViewerCount {
        /// Stream.
        stream_id: StreamId,
        /// New count.
        count: u64,
    },

    /// Message became visible.
    ChatMessage {
        /// Stream.
        stream_id: StreamId,
        /// The message.
        message: ChatMessage,
        /// Unread count after ingestion.
        unread: usize,
    },

    /// Messages were removed from the visible history (deleted, evicted,
    /// banned, or blocked).
    ChatMessagesRemoved {
        /// Stream.
        stream_id: StreamId,
        /// Removed message ids.
        message_ids: Vec<MessageId>,
    },

    /// Unread counter changed without a new message (viewport moved).
    UnreadChanged {
        /// Stream.
        stream_id: StreamId,
        /// New unread count.
        unread: usize,
    },

    /// Slow-mode gate changed.
    SlowMode {
        /// Stream.
        stream_id: StreamId,
        /// New gate state.
        state: SlowModeState,
    },

    /// A caller intent was rejected.
    Rejected(ClientError),
}
