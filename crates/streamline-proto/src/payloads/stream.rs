//! Live stream directory and audience payloads.

use serde::{Deserialize, Serialize};

/// Stream identifier (also the room identifier).
pub type StreamId = String;

/// A live stream announced by `stream-started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    /// Stream identifier.
    pub id: StreamId,
    /// Stream title.
    pub title: String,
    /// Broadcaster's user ID.
    pub streamer_id: String,
    /// Start time (milliseconds since Unix epoch).
    #[serde(default)]
    pub started_at: u64,
}

/// Payload naming a single stream (`stream-ended`, `viewer-joined`,
/// `viewer-left`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRef {
    /// Stream identifier.
    pub stream_id: StreamId,
}

/// Authoritative viewer count snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountUpdate {
    /// Stream identifier.
    pub stream_id: StreamId,
    /// Current number of viewers.
    pub viewer_count: u64,
}
