//! Connection lifecycle state machine.
//!
//! Owns the connect/reconnect policy for one transport. Uses the action
//! pattern: methods take inputs and return actions for the driver to execute
//! (open/close the transport, schedule/cancel the retry timer). This keeps the
//! state machine pure (no I/O, no clock) and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//!                 connect()              transport opened
//! ┌──────────────┐ ───────> ┌────────────┐ ───────────> ┌───────────┐
//! │ Disconnected │          │ Connecting │              │ Connected │
//! └──────────────┘ <─────── └────────────┘              └───────────┘
//!        ↑     auth error /    │      ↑                       │
//!        │     server close    │      │ retry timer           │ network drop
//!        │                     ↓      │                       │
//!        │                 ┌──────────────┐ <─────────────────┘
//!        └──────────────── │ Reconnecting │
//!           disconnect()   └──────────────┘
//!                                 │ retries exhausted
//!                                 ↓
//!                             ┌────────┐
//!                             │ Failed │
//!                             └────────┘
//! ```
//!
//! `Disconnected` and `Failed` are terminal until an explicit
//! [`ConnectionManager::connect`] (or a credential change, see
//! [`ConnectionManager::sync_credential`]).

use std::time::Duration;

use streamline_proto::OutboundEvent;

use crate::{
    error::{ConnectionError, RateLimitWarning},
    timer::{TimerAction, TimerId, TimerKind, TimerSlot},
};

/// Retry budget before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// First backoff delay; doubled for each subsequent retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Disconnect reasons that mean the server closed the session on purpose.
const SERVER_INITIATED_REASONS: &[&str] = &["io server disconnect", "server-initiated"];

/// Disconnect reasons that mean this client closed the session.
const CLIENT_INITIATED_REASONS: &[&str] = &["io client disconnect", "client-initiated"];

/// Bearer credential attached to the transport handshake.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the handshake.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl From<&str> for Token {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport; terminal until an explicit connect.
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open and authenticated.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
    /// Retries exhausted; terminal until an explicit connect.
    Failed,
}

/// Why the transport closed, classified from the wire reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server deliberately closed the session. Never retried.
    ServerInitiated,
    /// This client closed the session. Never retried.
    ClientInitiated,
    /// Network-level drop. Retried with backoff.
    Network(String),
}

impl DisconnectReason {
    /// Classify a transport disconnect reason.
    pub fn classify(reason: &str) -> Self {
        if SERVER_INITIATED_REASONS.contains(&reason) {
            Self::ServerInitiated
        } else if CLIENT_INITIATED_REASONS.contains(&reason) {
            Self::ClientInitiated
        } else {
            Self::Network(reason.to_owned())
        }
    }
}

/// Discrete inputs to the pure [`transition`] function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInput {
    /// Caller asked to connect.
    ConnectRequested,
    /// Transport reported a successful open.
    TransportOpened,
    /// Transport open (or an open transport) failed.
    TransportFailed {
        /// Whether the retry budget allows another attempt
        retries_left: bool,
    },
    /// Transport closed.
    Dropped {
        /// Classified reason
        reason: DisconnectReason,
        /// Whether the retry budget allows another attempt
        retries_left: bool,
    },
    /// Server rejected the credential.
    AuthRejected,
    /// Backoff timer fired.
    RetryElapsed,
    /// Caller asked to disconnect (or the credential was removed).
    DisconnectRequested,
}

/// Pure transition function for the connection state graph.
///
/// Inputs that make no sense in the current state leave it unchanged (a late
/// transport callback after `disconnect()` is a no-op).
pub fn transition(state: ConnectionState, input: &ConnectionInput) -> ConnectionState {
    use ConnectionState::{Connected, Connecting, Disconnected, Failed, Reconnecting};

    let retry_or_fail = |retries_left: bool| if retries_left { Reconnecting } else { Failed };

    match (state, input) {
        (Connected | Connecting, ConnectionInput::ConnectRequested) => state,
        (_, ConnectionInput::ConnectRequested) => Connecting,

        (Connecting, ConnectionInput::TransportOpened) => Connected,

        (Connecting | Connected, ConnectionInput::TransportFailed { retries_left }) => {
            retry_or_fail(*retries_left)
        },

        (Connecting | Connected, ConnectionInput::Dropped { reason, retries_left }) => {
            match reason {
                DisconnectReason::ServerInitiated | DisconnectReason::ClientInitiated => {
                    Disconnected
                },
                DisconnectReason::Network(_) => retry_or_fail(*retries_left),
            }
        },

        (_, ConnectionInput::AuthRejected | ConnectionInput::DisconnectRequested) => Disconnected,

        (Reconnecting, ConnectionInput::RetryElapsed) => Connecting,

        (state, _) => state,
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Retries scheduled before giving up
    pub max_attempts: u32,
    /// Backoff delay for the first retry
    pub base_delay: Duration,
}

impl ConnectionConfig {
    /// Backoff delay for retry number `attempt` (0-based):
    /// `base_delay * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(31))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: DEFAULT_BASE_DELAY }
    }
}

/// Observable connection record.
///
/// # Invariants
///
/// - `attempt` is 0 whenever `state` is `Connected`.
/// - `attempt <= max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Lifecycle state
    pub state: ConnectionState,
    /// Retries scheduled since the last successful connect
    pub attempt: u32,
    /// Most recent failure, cleared on successful connect
    pub last_error: Option<ConnectionError>,
    /// Credential used for the next handshake
    pub credential: Option<Token>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            last_error: None,
            credential: None,
        }
    }
}

/// Actions returned by the connection state machine.
///
/// The driver executes these:
/// - `OpenTransport`: open the transport with the credential in the handshake
/// - `CloseTransport`: close the transport (abort an in-flight open)
/// - `Send`: write the event to the open transport
/// - `Timer`: schedule or cancel the retry timer
/// - `StateChanged` / `Error` / `Warning`: surface to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the transport.
    OpenTransport {
        /// Credential to present in the handshake
        credential: Token,
    },
    /// Close the transport.
    CloseTransport,
    /// Send an event over the open transport.
    Send(OutboundEvent),
    /// Retry timer request.
    Timer(TimerAction),
    /// State transition happened.
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },
    /// Terminal error to surface (auth, server close, exhausted retries).
    Error(ConnectionError),
    /// Non-fatal rate-limit warning.
    Warning(RateLimitWarning),
}

/// Connection lifecycle manager.
///
/// Single owner of the connection record and the retry timer handle. All
/// mutation goes through its methods; each runs to completion and returns the
/// side effects as actions.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    conn: Connection,
    /// Credential that must not be auto-reused (rejected by the server, or
    /// its session was closed by the server).
    suppressed: Option<Token>,
    retry: TimerSlot,
    /// A transport exists (opening or open) and needs closing on teardown.
    transport_active: bool,
}

impl ConnectionManager {
    /// Create a manager in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            conn: Connection::default(),
            suppressed: None,
            retry: TimerSlot::new(TimerKind::Reconnect),
            transport_active: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.conn.state
    }

    /// Full connection record.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Retries scheduled since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.conn.attempt
    }

    /// Most recent failure. `None` after a successful connect.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.conn.last_error.as_ref()
    }

    /// True if `Connected`.
    pub fn is_connected(&self) -> bool {
        self.conn.state == ConnectionState::Connected
    }

    /// Live retry timer, if one is scheduled.
    pub fn pending_retry(&self) -> Option<&TimerId> {
        self.retry.live()
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start connecting with `credential`.
    ///
    /// No-op (apart from storing the credential) if already `Connected` or
    /// `Connecting`. From `Reconnecting` the pending retry is canceled and the
    /// attempt happens now. From `Disconnected`/`Failed` the retry budget
    /// starts over.
    pub fn connect(&mut self, credential: Token) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        match self.conn.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.conn.credential = Some(credential);
                return actions;
            },
            ConnectionState::Reconnecting => {
                if let Some(cancel) = self.retry.disarm() {
                    actions.push(ConnectionAction::Timer(cancel));
                }
            },
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.conn.attempt = 0;
            },
        }

        self.suppressed = None;
        self.conn.credential = Some(credential.clone());
        self.transport_active = true;

        self.apply(&ConnectionInput::ConnectRequested, &mut actions);
        actions.push(ConnectionAction::OpenTransport { credential });
        actions
    }

    /// Transport opened and the handshake was accepted (`connect` event).
    pub fn handle_connected(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if self.conn.state != ConnectionState::Connecting {
            return actions;
        }

        self.conn.attempt = 0;
        self.conn.last_error = None;
        self.apply(&ConnectionInput::TransportOpened, &mut actions);
        actions
    }

    /// Transport open failed (`connect_error` event).
    pub fn handle_connect_error(&mut self, message: impl Into<String>) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if !self.is_live() {
            return actions;
        }

        self.transport_active = false;
        let error = ConnectionError::Transport(message.into());
        let input = ConnectionInput::TransportFailed { retries_left: self.retries_left() };
        self.retry_or_fail(error, &input, &mut actions);
        actions
    }

    /// Transport closed (`disconnect` event).
    ///
    /// Server-initiated closes are terminal; network drops go through the
    /// same backoff policy as a failed connect.
    pub fn handle_disconnect(&mut self, reason: &str) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if !self.is_live() {
            return actions;
        }

        self.transport_active = false;
        let reason = DisconnectReason::classify(reason);
        let input =
            ConnectionInput::Dropped { reason: reason.clone(), retries_left: self.retries_left() };

        match reason {
            DisconnectReason::ServerInitiated => {
                let error = ConnectionError::ServerDisconnect("server closed the session".into());
                self.retry_or_fail(error, &input, &mut actions);
            },
            DisconnectReason::ClientInitiated => {
                self.cancel_retry(&mut actions);
                self.conn.attempt = 0;
                self.apply(&input, &mut actions);
            },
            DisconnectReason::Network(message) => {
                self.retry_or_fail(ConnectionError::Transport(message), &input, &mut actions);
            },
        }

        actions
    }

    /// Server rejected the credential (`auth_error` event).
    ///
    /// Force-closes the transport and does not retry: the credential must be
    /// refreshed before reconnecting.
    pub fn handle_auth_error(&mut self, message: impl Into<String>) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if self.conn.state == ConnectionState::Disconnected && !self.transport_active {
            return actions;
        }

        if self.transport_active {
            self.transport_active = false;
            actions.push(ConnectionAction::CloseTransport);
        }

        let error = ConnectionError::Auth(message.into());
        self.retry_or_fail(error, &ConnectionInput::AuthRejected, &mut actions);
        actions
    }

    /// Server rate-limit signal. Never changes state.
    pub fn handle_rate_limit(
        &self,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Vec<ConnectionAction> {
        vec![ConnectionAction::Warning(RateLimitWarning { message: message.into(), retry_after })]
    }

    /// Retry timer fired. Stale ids are ignored.
    pub fn handle_timer(&mut self, id: &TimerId) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if !self.retry.fire(id) || self.conn.state != ConnectionState::Reconnecting {
            return actions;
        }

        let Some(credential) = self.conn.credential.clone() else {
            // Credential vanished while waiting; nothing to reconnect with.
            self.apply(&ConnectionInput::DisconnectRequested, &mut actions);
            return actions;
        };

        self.transport_active = true;
        self.apply(&ConnectionInput::RetryElapsed, &mut actions);
        actions.push(ConnectionAction::OpenTransport { credential });
        actions
    }

    /// Tear down: cancel the retry timer, close the transport, reset to
    /// `Disconnected` with `attempt = 0`. Idempotent.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        self.cancel_retry(&mut actions);
        if self.transport_active {
            self.transport_active = false;
            actions.push(ConnectionAction::CloseTransport);
        }

        self.conn.attempt = 0;
        self.apply(&ConnectionInput::DisconnectRequested, &mut actions);
        actions
    }

    /// Send `event` if `Connected`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` in any other state. Nothing is sent.
    pub fn emit(&self, event: OutboundEvent) -> Result<ConnectionAction, ConnectionError> {
        if self.conn.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected { state: self.conn.state });
        }
        Ok(ConnectionAction::Send(event))
    }

    /// Level-triggered credential binding.
    ///
    /// Call with the externally observed credential whenever it may have
    /// changed; repeated calls with the same value converge and emit nothing.
    ///
    /// - `None`: disconnect and forget the credential.
    /// - `Some` while `Disconnected`: connect, unless this exact credential was
    ///   rejected or its session closed by the server.
    /// - `Some` in any other state: store it for the next handshake.
    pub fn sync_credential(&mut self, credential: Option<Token>) -> Vec<ConnectionAction> {
        let Some(token) = credential else {
            self.conn.credential = None;
            self.suppressed = None;
            return self.disconnect();
        };

        if self.conn.state == ConnectionState::Disconnected
            && self.suppressed.as_ref() != Some(&token)
        {
            return self.connect(token);
        }

        self.conn.credential = Some(token);
        Vec::new()
    }

    fn is_live(&self) -> bool {
        matches!(self.conn.state, ConnectionState::Connecting | ConnectionState::Connected)
    }

    fn retries_left(&self) -> bool {
        self.conn.attempt < self.config.max_attempts
    }

    fn cancel_retry(&mut self, actions: &mut Vec<ConnectionAction>) {
        if let Some(cancel) = self.retry.disarm() {
            actions.push(ConnectionAction::Timer(cancel));
        }
    }

    /// Failure policy shared by every error path.
    ///
    /// Transient errors back off until the retry budget runs out. Anything
    /// else fails at once and holds back the current credential until it
    /// changes.
    fn retry_or_fail(
        &mut self,
        error: ConnectionError,
        input: &ConnectionInput,
        actions: &mut Vec<ConnectionAction>,
    ) {
        if !error.is_transient() {
            self.cancel_retry(actions);
            self.suppressed = self.conn.credential.clone();
            self.conn.attempt = 0;
            self.conn.last_error = Some(error.clone());
            self.apply(input, actions);
            actions.push(ConnectionAction::Error(error));
        } else if self.retries_left() {
            let delay = self.config.backoff_delay(self.conn.attempt);
            self.conn.last_error = Some(error);
            actions.extend(self.retry.arm(delay).into_iter().map(ConnectionAction::Timer));
            self.conn.attempt += 1;
            self.apply(input, actions);
        } else {
            let exhausted =
                ConnectionError::ExhaustedRetries { attempts: self.conn.attempt, last: error.to_string() };
            self.cancel_retry(actions);
            self.conn.last_error = Some(exhausted.clone());
            self.apply(input, actions);
            actions.push(ConnectionAction::Error(exhausted));
        }

        debug_assert!(self.conn.attempt <= self.config.max_attempts);
    }

    fn apply(&mut self, input: &ConnectionInput, actions: &mut Vec<ConnectionAction>) {
        let from = self.conn.state;
        let to = transition(from, input);
        if from != to {
            self.conn.state = to;
            actions.push(ConnectionAction::StateChanged { from, to });
        }
        debug_assert!(self.conn.state != ConnectionState::Connected || self.conn.attempt == 0);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}
