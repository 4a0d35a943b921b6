//! Model-free property tests for the client state machine.
//!
//! Random sequences of transport callbacks, server frames, timer firings, and
//! caller intents are fed to a [`Client`]; invariants are checked after every
//! step rather than against a reference model.

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use streamline_client::{
    Client, ClientAction, ClientConfig, ClientEvent, ConnectionState, SystemEnv, Token,
};
use streamline_core::TimerId;
use streamline_proto::{
    ChatMessage, InboundEvent, MessageType, NewMessage, OutboundEvent, SlowModeToggle, StreamRef,
    UserBanned,
};

const STREAMS: [&str; 3] = ["s0", "s1", "s2"];
const USERS: [&str; 3] = ["u0", "u1", "u2"];

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Connected,
    ConnectError,
    NetworkDrop,
    ServerDrop,
    Join(usize),
    Leave(usize),
    Send(usize),
    Message { stream: usize, id: u8, user: usize },
    Ban { stream: usize, user: usize },
    ViewerLeft(usize),
    SlowMode { stream: usize, enabled: bool },
    Block(usize),
    Unblock(usize),
    FireTimer(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Connect),
        3 => Just(Op::Connected),
        1 => Just(Op::ConnectError),
        1 => Just(Op::NetworkDrop),
        1 => Just(Op::ServerDrop),
        2 => (0..3usize).prop_map(Op::Join),
        1 => (0..3usize).prop_map(Op::Leave),
        2 => (0..3usize).prop_map(Op::Send),
        3 => (0..3usize, 0..16u8, 0..3usize)
            .prop_map(|(stream, id, user)| Op::Message { stream, id, user }),
        1 => (0..3usize, 0..3usize).prop_map(|(stream, user)| Op::Ban { stream, user }),
        1 => (0..3usize).prop_map(Op::ViewerLeft),
        1 => (0..3usize, any::<bool>()).prop_map(|(stream, enabled)| Op::SlowMode { stream, enabled }),
        1 => (0..3usize).prop_map(Op::Block),
        1 => (0..3usize).prop_map(Op::Unblock),
        3 => (0..8usize).prop_map(Op::FireTimer),
    ]
}

fn frame(event: InboundEvent) -> ClientEvent {
    ClientEvent::FrameReceived(event.into_frame().unwrap())
}

/// Event for every op except `FireTimer`, which needs the outstanding timers.
fn event_for(op: &Op) -> Option<ClientEvent> {
    let event = match op {
        Op::Connect => ClientEvent::Connect(Token::new("t")),
        Op::Connected => ClientEvent::Connected,
        Op::ConnectError => ClientEvent::ConnectError { message: "refused".into() },
        Op::NetworkDrop => ClientEvent::Disconnected { reason: "ping timeout".into() },
        Op::ServerDrop => ClientEvent::Disconnected { reason: "io server disconnect".into() },
        Op::Join(s) => ClientEvent::JoinStream { stream_id: STREAMS[*s].into() },
        Op::Leave(s) => ClientEvent::LeaveStream { stream_id: STREAMS[*s].into() },
        Op::Send(s) => ClientEvent::SendMessage {
            stream_id: STREAMS[*s].into(),
            content: " hello ".into(),
            kind: MessageType::Text,
        },
        Op::Message { stream, id, user } => frame(InboundEvent::NewMessage(NewMessage {
            stream_id: STREAMS[*stream].into(),
            message: ChatMessage {
                id: format!("m{id}"),
                user_id: USERS[*user].into(),
                content: "hi".into(),
                kind: MessageType::Text,
                timestamp: 0,
            },
        })),
        Op::Ban { stream, user } => frame(InboundEvent::UserBanned(UserBanned {
            stream_id: STREAMS[*stream].into(),
            user_id: USERS[*user].into(),
        })),
        Op::ViewerLeft(s) => {
            frame(InboundEvent::ViewerLeft(StreamRef { stream_id: STREAMS[*s].into() }))
        },
        Op::SlowMode { stream, enabled } => frame(InboundEvent::SlowModeToggle(SlowModeToggle {
            stream_id: STREAMS[*stream].into(),
            enabled: *enabled,
            duration: 2,
        })),
        Op::Block(u) => ClientEvent::Block { user_id: USERS[*u].into() },
        Op::Unblock(u) => ClientEvent::Unblock { user_id: USERS[*u].into() },
        Op::FireTimer(_) => return None,
    };
    Some(event)
}

/// Track timer bookkeeping from a batch of actions.
fn record_timers(actions: &[ClientAction], outstanding: &mut Vec<TimerId>) {
    for action in actions {
        match action {
            ClientAction::ScheduleTimer { id, .. } => outstanding.push(id.clone()),
            ClientAction::CancelTimer { id } => outstanding.retain(|t| t != id),
            _ => {},
        }
    }
}

proptest! {
    /// INVARIANTS after every step:
    /// - every sent frame decodes as an outbound event and is sent while
    ///   `Connected`
    /// - entering `Connected` sends exactly one `join-room` per member room
    /// - no visible message is from a blocked user
    /// - every live timer was scheduled and not yet canceled or fired
    /// - firing a timer the client no longer considers live does nothing
    #[test]
    fn prop_client_invariants(ops in prop::collection::vec(op(), 0..96)) {
        let mut client = Client::new(SystemEnv::new(), ClientConfig::default());
        client.handle(ClientEvent::IdentityChanged(Some("me".into()))).unwrap();
        let mut outstanding: Vec<TimerId> = Vec::new();

        for op in &ops {
            let before = client.state();

            let result = match op {
                Op::FireTimer(index) => {
                    if outstanding.is_empty() {
                        continue;
                    }
                    let id = outstanding.remove(index % outstanding.len());
                    let live = client.live_timers().contains(&id);
                    let result = client.handle(ClientEvent::TimerFired(id));
                    if !live {
                        prop_assert!(matches!(&result, Ok(actions) if actions.is_empty()));
                    }
                    result
                },
                other => match event_for(other) {
                    Some(event) => client.handle(event),
                    None => continue,
                },
            };
            // Local rejections (not joined, cooldown, not connected) carry no actions.
            let Ok(actions) = result else { continue };
            record_timers(&actions, &mut outstanding);

            let sent: Vec<OutboundEvent> = actions
                .iter()
                .filter_map(|a| match a {
                    ClientAction::Send(frame) => Some(OutboundEvent::from_frame(frame).unwrap()),
                    _ => None,
                })
                .collect();
            if !sent.is_empty() {
                prop_assert_eq!(client.state(), ConnectionState::Connected);
            }

            if before != ConnectionState::Connected && client.state() == ConnectionState::Connected {
                let joined: Vec<String> = sent
                    .iter()
                    .filter_map(|e| match e {
                        OutboundEvent::JoinRoom(req) => Some(req.room_id.clone()),
                        _ => None,
                    })
                    .collect();
                let rooms: Vec<String> = client.session().rooms().cloned().collect();
                prop_assert_eq!(joined.len(), rooms.len());
                prop_assert_eq!(
                    joined.into_iter().collect::<BTreeSet<_>>(),
                    rooms.into_iter().collect::<BTreeSet<_>>()
                );
            }

            for stream_id in STREAMS {
                if let Some(stream) = client.stream(stream_id) {
                    prop_assert!(stream.chat().messages().all(|m| !client.is_blocked(&m.user_id)));
                }
            }

            let outstanding_set: HashSet<&TimerId> = outstanding.iter().collect();
            for id in client.live_timers() {
                prop_assert!(outstanding_set.contains(&id), "live timer {:?} never scheduled", id);
            }
        }

        client.teardown();
        prop_assert!(client.live_timers().is_empty());
        prop_assert_eq!(client.handle(ClientEvent::Connected), Ok(Vec::new()));
        prop_assert!(client.teardown().is_empty());
    }
}
