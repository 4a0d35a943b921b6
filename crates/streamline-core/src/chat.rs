//! Chat ingestion pipeline.
//!
//! [`ChatStream`] holds one stream's visible chat history: blocklist filtered,
//! deduplicated by message id, bounded by FIFO eviction in arrival order, with
//! unread tracking driven by the consumer's scroll position.
//!
//! Outbound sends are validated locally by [`validate_send`] before anything
//! reaches the connection.

use std::collections::{HashSet, VecDeque};

use streamline_proto::{ChatMessage, MessageId, UserId};

use crate::{error::SendRejected, slow_mode::SlowModeGate};

/// Default history bound.
pub const DEFAULT_MAX_MESSAGES: usize = 500;

/// Default distance (px) from the bottom that still counts as "at bottom".
pub const DEFAULT_BOTTOM_THRESHOLD: u32 = 50;

/// Default slow-mode cooldown after a local send, in seconds.
pub const DEFAULT_COOLDOWN_SECS: u32 = 30;

/// Chat configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Messages retained before the oldest are evicted
    pub max_messages: usize,
    /// Scroll distance from the bottom still treated as "at bottom"
    pub bottom_threshold: u32,
    /// Slow-mode cooldown armed by each local send, and by a server toggle
    /// without a duration
    pub default_cooldown_secs: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD,
            default_cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Result of [`ChatStream::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Appended to the visible sequence.
    Appended {
        /// Oldest messages dropped to keep the bound
        evicted: Vec<ChatMessage>,
    },
    /// Sender is blocked; dropped.
    Blocked,
    /// Same id already visible; dropped.
    Duplicate,
}

/// Bounded, filtered chat history for one stream.
///
/// # Invariants
///
/// - `len() <= max_messages`
/// - No visible message is from a blocked user.
/// - Visible message ids are unique.
/// - `unread_count() == 0` while at bottom.
#[derive(Debug, Clone)]
pub struct ChatStream {
    config: ChatConfig,
    /// Arrival order; front is oldest.
    messages: VecDeque<ChatMessage>,
    ids: HashSet<MessageId>,
    blocked: HashSet<UserId>,
    at_bottom: bool,
    unread: usize,
}

impl ChatStream {
    /// Create an empty stream, scrolled to the bottom.
    pub fn new(config: ChatConfig) -> Self {
        Self {
            messages: VecDeque::with_capacity(config.max_messages.min(1024)),
            config,
            ids: HashSet::new(),
            blocked: HashSet::new(),
            at_bottom: true,
            unread: 0,
        }
    }

    /// Create a stream that starts with an existing blocklist.
    pub fn with_blocklist(config: ChatConfig, blocked: impl IntoIterator<Item = UserId>) -> Self {
        let mut stream = Self::new(config);
        stream.blocked.extend(blocked);
        stream
    }

    /// Ingest an inbound message.
    pub fn ingest(&mut self, message: ChatMessage) -> IngestOutcome {
        if self.blocked.contains(&message.user_id) {
            return IngestOutcome::Blocked;
        }
        if self.ids.contains(&message.id) {
            return IngestOutcome::Duplicate;
        }

        self.ids.insert(message.id.clone());
        self.messages.push_back(message);

        let mut evicted = Vec::new();
        while self.messages.len() > self.config.max_messages {
            let Some(oldest) = self.messages.pop_front() else { break };
            self.ids.remove(&oldest.id);
            evicted.push(oldest);
        }

        if !self.at_bottom {
            self.unread += 1;
        }

        IngestOutcome::Appended { evicted }
    }

    /// Remove a message. Returns `false` if it was not visible.
    pub fn delete(&mut self, message_id: &str) -> bool {
        if !self.ids.remove(message_id) {
            return false;
        }
        self.messages.retain(|m| m.id != message_id);
        true
    }

    /// Block `user_id` and purge their visible messages.
    ///
    /// Returns the ids of the removed messages.
    pub fn block(&mut self, user_id: &str) -> Vec<MessageId> {
        self.blocked.insert(user_id.to_owned());
        self.purge_user(user_id)
    }

    /// Unblock `user_id`. Purged messages are not restored.
    pub fn unblock(&mut self, user_id: &str) -> bool {
        self.blocked.remove(user_id)
    }

    /// True if `user_id` is blocked.
    pub fn is_blocked(&self, user_id: &str) -> bool {
        self.blocked.contains(user_id)
    }

    /// Remove every visible message from `user_id` without blocking them.
    ///
    /// Returns the ids of the removed messages, oldest first.
    pub fn purge_user(&mut self, user_id: &str) -> Vec<MessageId> {
        let mut removed = Vec::new();
        self.messages.retain(|m| {
            if m.user_id == user_id {
                removed.push(m.id.clone());
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.ids.remove(id);
        }
        removed
    }

    /// Consumer reports the viewport's distance from the bottom.
    ///
    /// Returning to the bottom resets the unread counter.
    pub fn report_scroll(&mut self, distance_from_bottom: u32) {
        self.at_bottom = distance_from_bottom <= self.config.bottom_threshold;
        if self.at_bottom {
            self.unread = 0;
        }
    }

    /// Visible messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Visible message count.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no messages are visible.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages ingested since the viewport left the bottom.
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// True if the viewport is within the bottom threshold.
    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// Configuration in use.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}

impl Default for ChatStream {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

/// Preconditions for an outbound send, gathered by the caller.
#[derive(Debug, Clone, Copy)]
pub struct SendContext<'g> {
    /// Connection is `Connected`
    pub connected: bool,
    /// A user is signed in
    pub has_identity: bool,
    /// Slow-mode gate of the target stream, if it has one
    pub gate: Option<&'g SlowModeGate>,
}

/// Validate an outbound chat message without touching the network.
///
/// Returns the trimmed content on success.
///
/// # Errors
///
/// Checked in order:
/// - `SendRejected::NotConnected`
/// - `SendRejected::NoIdentity`
/// - `SendRejected::SlowMode` while a cooldown is running
/// - `SendRejected::EmptyContent` if only whitespace
pub fn validate_send<'a>(
    content: &'a str,
    ctx: &SendContext<'_>,
) -> Result<&'a str, SendRejected> {
    if !ctx.connected {
        return Err(SendRejected::NotConnected);
    }
    if !ctx.has_identity {
        return Err(SendRejected::NoIdentity);
    }
    if let Some(gate) = ctx.gate {
        gate.check()?;
    }

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SendRejected::EmptyContent);
    }
    Ok(trimmed)
}
