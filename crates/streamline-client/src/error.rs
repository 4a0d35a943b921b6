//! Client, runtime, and transport errors.

use streamline_core::{ConnectionError, SendRejected};
use thiserror::Error;

/// Errors returned by [`crate::Client::handle`].
///
/// None of these change connection state; they reject one caller intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Outbound chat rejected locally.
    #[error("send rejected: {0}")]
    Rejected(#[from] SendRejected),

    /// Operation needs a connection that is not available.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the [`crate::Runtime`] handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Runtime loop has exited; commands can no longer be delivered.
    #[error("runtime stopped")]
    Stopped,
}
