//! Fuzz target for the ConnectionManager state machine
//!
//! # Strategy
//!
//! - Arbitrary interleavings of intents, transport results, and timer firings
//! - Arbitrary disconnect reason strings (classification edge cases)
//! - Firing both the live retry timer and previously canceled ones
//!
//! # Invariants
//!
//! - Every `StateChanged` agrees with the pure `transition` function
//! - `attempt` never exceeds the retry budget and is 0 while Connected
//! - A retry timer is pending only while Reconnecting
//! - Stale timer firings produce no actions

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use streamline_core::{
    ConnectionAction, ConnectionManager, ConnectionState, TimerAction, TimerId, Token,
};

#[derive(Debug, Clone, Arbitrary)]
enum ConnectionOp {
    Connect { token: u8 },
    Connected,
    ConnectError,
    Dropped { reason: String },
    AuthError,
    FireLive,
    FireStale { index: u8 },
    Disconnect,
    Credential { token: Option<u8> },
}

fuzz_target!(|ops: Vec<ConnectionOp>| {
    let mut manager = ConnectionManager::default();
    let mut stale: Vec<TimerId> = Vec::new();

    for op in ops {
        let before = manager.state();

        let actions = match op {
            ConnectionOp::Connect { token } => manager.connect(Token::new(token.to_string())),
            ConnectionOp::Connected => manager.handle_connected(),
            ConnectionOp::ConnectError => manager.handle_connect_error("refused"),
            ConnectionOp::Dropped { reason } => manager.handle_disconnect(&reason),
            ConnectionOp::AuthError => manager.handle_auth_error("expired"),
            ConnectionOp::FireLive => match manager.pending_retry().cloned() {
                Some(id) => {
                    let actions = manager.handle_timer(&id);
                    stale.push(id);
                    actions
                },
                None => Vec::new(),
            },
            ConnectionOp::FireStale { index } => {
                if stale.is_empty() {
                    continue;
                }
                let id = stale[index as usize % stale.len()].clone();
                let actions = manager.handle_timer(&id);
                assert!(actions.is_empty(), "stale timer produced {actions:?}");
                actions
            },
            ConnectionOp::Disconnect => manager.disconnect(),
            ConnectionOp::Credential { token } => {
                manager.sync_credential(token.map(|t| Token::new(t.to_string())))
            },
        };

        let mut state = before;
        for action in &actions {
            match action {
                ConnectionAction::StateChanged { from, to } => {
                    assert_eq!(*from, state, "state change from an unexpected state");
                    assert_ne!(from, to, "no-op state change emitted");
                    state = *to;
                },
                ConnectionAction::Timer(TimerAction::Cancel { id }) => stale.push(id.clone()),
                _ => {},
            }
        }
        assert_eq!(state, manager.state(), "notifications disagree with final state");

        assert!(manager.attempt() <= manager.config().max_attempts);
        if manager.state() == ConnectionState::Connected {
            assert_eq!(manager.attempt(), 0);
        }
        if manager.pending_retry().is_some() {
            assert_eq!(manager.state(), ConnectionState::Reconnecting);
        }
    }
});
