//! Tests for the reconnect policy.
//!
//! These tests verify critical invariants:
//! - Backoff delays are exactly 1s, 2s, 4s, 8s, 16s and then stop
//! - Server-initiated disconnects never schedule a retry
//! - Stale timer ids never reopen the transport
//! - `attempt` never exceeds the retry budget

use std::time::Duration;

use proptest::prelude::*;
use streamline_core::{
    ConnectionAction, ConnectionError, ConnectionManager, ConnectionState, TimerAction, TimerId,
    Token,
};

fn schedules(actions: &[ConnectionAction]) -> Vec<(TimerId, Duration)> {
    actions
        .iter()
        .filter_map(|a| match a {
            ConnectionAction::Timer(TimerAction::Schedule { id, delay }) => {
                Some((id.clone(), *delay))
            },
            _ => None,
        })
        .collect()
}

fn opens(actions: &[ConnectionAction]) -> usize {
    actions.iter().filter(|a| matches!(a, ConnectionAction::OpenTransport { .. })).count()
}

/// Drive a manager through failures until it stops retrying. Returns the
/// scheduled delays in order.
fn fail_until_terminal(manager: &mut ConnectionManager) -> Vec<Duration> {
    let mut delays = Vec::new();
    let mut actions = manager.handle_connect_error("connection refused");

    while let Some((id, delay)) = schedules(&actions).pop() {
        delays.push(delay);
        let reopen = manager.handle_timer(&id);
        assert_eq!(opens(&reopen), 1, "live retry timer must reopen the transport");
        actions = manager.handle_connect_error("connection refused");
    }

    delays
}

/// INVARIANT: Retry delays are exactly 1000, 2000, 4000, 8000, 16000 ms.
#[test]
fn backoff_sequence_then_failed() {
    let mut manager = ConnectionManager::default();
    manager.connect(Token::new("t"));

    let delays = fail_until_terminal(&mut manager);
    let millis: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
    assert_eq!(millis, vec![1000, 2000, 4000, 8000, 16000]);

    // INVARIANT: No 6th retry, terminal Failed, last error surfaced
    assert_eq!(manager.state(), ConnectionState::Failed);
    assert_eq!(manager.attempt(), 5);
    assert!(matches!(
        manager.last_error(),
        Some(ConnectionError::ExhaustedRetries { attempts: 5, .. })
    ));
    assert!(manager.pending_retry().is_none(), "no timers may remain after Failed");
}

/// Five consecutive failures still leave the last retry pending; the sixth
/// is terminal.
#[test]
fn fifth_failure_still_retries() {
    let mut manager = ConnectionManager::default();
    manager.connect(Token::new("t"));

    let mut actions = manager.handle_connect_error("connection refused");
    for _ in 1..5 {
        let (id, _) = schedules(&actions).pop().unwrap();
        manager.handle_timer(&id);
        actions = manager.handle_connect_error("connection refused");
    }

    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    let (id, delay) = schedules(&actions).pop().unwrap();
    assert_eq!(delay, Duration::from_secs(16));
    assert_eq!(manager.pending_retry(), Some(&id));

    manager.handle_timer(&id);
    manager.handle_connect_error("connection refused");
    assert_eq!(manager.state(), ConnectionState::Failed);
    assert!(manager.pending_retry().is_none());
}

/// INVARIANT: Failed is terminal until an explicit connect, which restarts the
/// budget.
#[test]
fn explicit_connect_after_failed_restarts_budget() {
    let mut manager = ConnectionManager::default();
    manager.connect(Token::new("t"));
    fail_until_terminal(&mut manager);

    let actions = manager.connect(Token::new("t"));
    assert_eq!(opens(&actions), 1);
    assert_eq!(manager.attempt(), 0);

    let actions = manager.handle_connect_error("refused");
    assert_eq!(schedules(&actions)[0].1, Duration::from_millis(1000));
}

/// INVARIANT: Network drops use the same policy as connect failures.
#[test]
fn drops_mid_session_share_the_budget() {
    let mut manager = ConnectionManager::default();
    manager.connect(Token::new("t"));
    manager.handle_connected();

    let actions = manager.handle_disconnect("ping timeout");
    let (id, delay) = schedules(&actions).pop().unwrap();
    assert_eq!(delay, Duration::from_millis(1000));

    manager.handle_timer(&id);
    let actions = manager.handle_disconnect("transport error");
    assert_eq!(schedules(&actions).pop().unwrap().1, Duration::from_millis(2000));
}

/// INVARIANT: A stale retry id (superseded by an explicit connect) is a no-op.
#[test]
fn superseded_retry_timer_is_stale() {
    let mut manager = ConnectionManager::default();
    manager.connect(Token::new("t"));
    let (stale, _) = schedules(&manager.handle_connect_error("refused")).pop().unwrap();

    let actions = manager.connect(Token::new("t"));
    assert!(actions.contains(&ConnectionAction::Timer(TimerAction::Cancel { id: stale.clone() })));
    assert_eq!(manager.state(), ConnectionState::Connecting);

    assert!(manager.handle_timer(&stale).is_empty());
}

/// Scenario: credential cleared while connected closes the transport without
/// retrying.
#[test]
fn credential_cleared_while_connected() {
    let mut manager = ConnectionManager::default();
    manager.sync_credential(Some(Token::new("t")));
    manager.handle_connected();

    let actions = manager.sync_credential(None);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(actions.contains(&ConnectionAction::CloseTransport));
    assert!(schedules(&actions).is_empty());
    assert!(manager.pending_retry().is_none());
}

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Connected,
    ConnectError,
    NetworkDrop,
    ServerDrop,
    AuthError,
    FireLive,
    FireStale,
    Disconnect,
    SetCredential(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Connect),
        Just(Op::Connected),
        Just(Op::ConnectError),
        Just(Op::NetworkDrop),
        Just(Op::ServerDrop),
        Just(Op::AuthError),
        Just(Op::FireLive),
        Just(Op::FireStale),
        Just(Op::Disconnect),
        any::<bool>().prop_map(Op::SetCredential),
    ]
}

proptest! {
    /// INVARIANT: For any event sequence, `attempt <= max_attempts`,
    /// `attempt == 0` while Connected, and a server-initiated disconnect
    /// never schedules a retry.
    #[test]
    fn prop_connection_invariants(ops in prop::collection::vec(op(), 0..64)) {
        let mut manager = ConnectionManager::default();
        let mut stale: Vec<TimerId> = Vec::new();

        for op in ops {
            let actions = match op {
                Op::Connect => manager.connect(Token::new("t")),
                Op::Connected => manager.handle_connected(),
                Op::ConnectError => manager.handle_connect_error("refused"),
                Op::NetworkDrop => manager.handle_disconnect("ping timeout"),
                Op::ServerDrop => {
                    let actions = manager.handle_disconnect("server-initiated");
                    prop_assert!(schedules(&actions).is_empty());
                    actions
                },
                Op::AuthError => manager.handle_auth_error("expired"),
                Op::FireLive => match manager.pending_retry().cloned() {
                    Some(id) => {
                        let actions = manager.handle_timer(&id);
                        stale.push(id);
                        actions
                    },
                    None => Vec::new(),
                },
                Op::FireStale => match stale.first().cloned() {
                    Some(id) => {
                        let actions = manager.handle_timer(&id);
                        prop_assert!(actions.is_empty());
                        actions
                    },
                    None => Vec::new(),
                },
                Op::Disconnect => manager.disconnect(),
                Op::SetCredential(present) => {
                    manager.sync_credential(present.then(|| Token::new("t")))
                },
            };

            for action in &actions {
                if let ConnectionAction::Timer(TimerAction::Cancel { id }) = action {
                    stale.push(id.clone());
                }
            }

            prop_assert!(manager.attempt() <= manager.config().max_attempts);
            if manager.state() == ConnectionState::Connected {
                prop_assert_eq!(manager.attempt(), 0);
            }
            if manager.pending_retry().is_some() {
                prop_assert_eq!(manager.state(), ConnectionState::Reconnecting);
            }
        }
    }
}
