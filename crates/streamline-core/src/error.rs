//! Error types for the realtime client core.
//!
//! Transport and timer failures are absorbed by the connection state machine
//! (retried or terminalized); callers only see the resulting state plus the
//! last error. Local send rejections are a separate type because they never
//! touch the network.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors recorded by the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Network-level failure while opening or using the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Credential was rejected after the transport opened.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server deliberately closed the session.
    #[error("disconnected by server: {0}")]
    ServerDisconnect(String),

    /// Retry budget exhausted; the manager is `Failed`.
    #[error("gave up after {attempts} reconnect attempts: {last}")]
    ExhaustedRetries {
        /// Number of retries that were scheduled
        attempts: u32,
        /// Last transport error message
        last: String,
    },

    /// Operation requires a `Connected` manager.
    #[error("not connected (state: {state:?})")]
    NotConnected {
        /// State when the operation was attempted
        state: ConnectionState,
    },
}

impl ConnectionError {
    /// Returns true if this error is transient and handled by the backoff
    /// policy.
    ///
    /// Auth failures and server-initiated disconnects need a new credential or
    /// an explicit reconnect; they are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Non-fatal rate-limit signal from the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rate limited: {message}")]
pub struct RateLimitWarning {
    /// Server-provided message
    pub message: String,
    /// Suggested wait before retrying, in seconds
    pub retry_after: Option<u64>,
}

/// Reasons an outbound chat send is rejected locally, without a round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendRejected {
    /// Connection is not `Connected`.
    #[error("not connected")]
    NotConnected,

    /// No signed-in user.
    #[error("no active identity")]
    NoIdentity,

    /// Slow-mode cooldown still running.
    #[error("slow mode: wait {remaining_secs}s")]
    SlowMode {
        /// Seconds until sends are allowed again
        remaining_secs: u32,
    },

    /// Message is empty after trimming whitespace.
    #[error("message is empty")]
    EmptyContent,

    /// Stream is not joined.
    #[error("not joined to stream {0}")]
    NotJoined(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(ConnectionError::Transport("connection reset".to_string()).is_transient());
    }

    #[test]
    fn terminal_errors_are_not_transient() {
        assert!(!ConnectionError::Auth("expired".to_string()).is_transient());
        assert!(!ConnectionError::ServerDisconnect("kicked".to_string()).is_transient());
        assert!(
            !ConnectionError::ExhaustedRetries { attempts: 5, last: "timeout".to_string() }
                .is_transient()
        );
        assert!(
            !ConnectionError::NotConnected { state: ConnectionState::Failed }.is_transient()
        );
    }
}
