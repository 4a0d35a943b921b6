//! Session management payloads: handshake, room subscriptions, notices.

use serde::{Deserialize, Serialize};

/// First frame sent on a freshly opened transport.
///
/// Carries the bearer credential so the server can authenticate the channel
/// before any room traffic flows.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Bearer token.
    pub token: String,
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake").field("token", &"<redacted>").finish()
    }
}

/// Subscribe to or unsubscribe from a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    /// Room (stream) identifier.
    pub room_id: String,
}

/// Human-readable server notice (`auth_error`, `rate_limit`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    /// Message text.
    pub message: String,
    /// Suggested wait before retrying, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl Notice {
    /// Create a notice without a retry hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), retry_after: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_debug_redacts_token() {
        let hs = Handshake { token: "secret-token".to_string() };
        let rendered = format!("{hs:?}");
        assert!(!rendered.contains("secret-token"));
    }
}
