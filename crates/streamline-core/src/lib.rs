//! Streamline core
//!
//! Pure state machines for the realtime client: connection lifecycle, room
//! membership, chat ingestion, slow-mode backpressure, and viewer counts.
//!
//! # Architecture
//!
//! Every component follows the action pattern: methods take inputs and return
//! actions for a driver to execute. Nothing here performs I/O, reads the
//! clock, or spawns timers. Timers are requested with [`TimerAction`] and come
//! back as [`TimerId`]s, so a driver (or a test) decides when they fire.
//!
//! # Components
//!
//! - [`ConnectionManager`]: connect/reconnect state machine with backoff
//! - [`ChannelSession`]: room membership and resubscription
//! - [`ChatStream`]: bounded, filtered chat history with unread tracking
//! - [`SlowModeGate`]: local cooldown in front of outbound chat
//! - [`ViewerCountAggregator`]: delta + snapshot reconciliation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chat;
pub mod connection;
pub mod env;
pub mod error;
pub mod session;
pub mod slow_mode;
pub mod timer;
pub mod viewers;

pub use chat::{ChatConfig, ChatStream, IngestOutcome, SendContext, validate_send};
pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionInput, ConnectionManager,
    ConnectionState, DisconnectReason, Token, transition,
};
pub use env::Environment;
pub use error::{ConnectionError, RateLimitWarning, SendRejected};
pub use session::ChannelSession;
pub use slow_mode::{SlowModeGate, SlowModeState};
pub use timer::{TimerAction, TimerId, TimerKind, TimerSlot};
pub use viewers::{ViewerCountAggregator, ViewerDelta};
