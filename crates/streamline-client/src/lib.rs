//! Client
//!
//! Realtime client for the Streamline live-streaming platform. Manages the
//! connection lifecycle, stream memberships, chat, slow mode, and viewer
//! counts on top of [`streamline_core`].
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`streamline_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine owning every per-stream session
//! - [`Runtime`]: tokio driver executing actions against a [`Transport`]
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//! - [`Notification`]: State changes delivered to subscribers
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! `transport::QuicTransport`, a QUIC implementation of [`Transport`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod env;
mod error;
mod event;
mod runtime;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, ClientConfig, StreamSession};
pub use env::SystemEnv;
pub use error::{ClientError, RuntimeError, TransportError};
pub use event::{ClientAction, ClientEvent, Notification};
pub use runtime::{Runtime, RuntimeHandle, Subscription, Transport, TransportEvent};
pub use streamline_core::{ConnectionState, Environment, Token};
