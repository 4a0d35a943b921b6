//! Fuzz target for ChatStream ingestion
//!
//! Small id and user spaces force collisions: duplicate ids, repeated
//! blocks, deletes of evicted messages.
//!
//! # Invariants
//!
//! - History never exceeds its capacity
//! - No visible message is from a blocked user
//! - Message ids in history are unique
//! - Unread count is 0 while at the bottom

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use streamline_core::{ChatConfig, ChatStream};
use streamline_proto::{ChatMessage, MessageType};

const CAPACITY: usize = 16;

#[derive(Debug, Clone, Arbitrary)]
enum ChatOp {
    Ingest { id: u8, user: u8 },
    Delete { id: u8 },
    Block { user: u8 },
    Unblock { user: u8 },
    Purge { user: u8 },
    Scroll { distance: u32 },
}

fn user(n: u8) -> String {
    format!("u{}", n % 8)
}

fuzz_target!(|ops: Vec<ChatOp>| {
    let mut stream = ChatStream::new(ChatConfig { max_messages: CAPACITY, ..ChatConfig::default() });

    for op in ops {
        match op {
            ChatOp::Ingest { id, user: u } => {
                stream.ingest(ChatMessage {
                    id: format!("m{id}"),
                    user_id: user(u),
                    content: String::new(),
                    kind: MessageType::Text,
                    timestamp: 0,
                });
            },
            ChatOp::Delete { id } => {
                stream.delete(&format!("m{id}"));
            },
            ChatOp::Block { user: u } => {
                stream.block(&user(u));
            },
            ChatOp::Unblock { user: u } => {
                stream.unblock(&user(u));
            },
            ChatOp::Purge { user: u } => {
                let removed = stream.purge_user(&user(u));
                assert!(stream.messages().all(|m| m.user_id != user(u)));
                assert!(removed.len() <= CAPACITY);
            },
            ChatOp::Scroll { distance } => stream.report_scroll(distance),
        }

        assert!(stream.len() <= CAPACITY);
        assert!(stream.messages().all(|m| !stream.is_blocked(&m.user_id)));

        let ids: HashSet<_> = stream.messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), stream.len(), "duplicate message ids in history");

        if stream.is_at_bottom() {
            assert_eq!(stream.unread_count(), 0);
        }
    }
});
