//! Room membership.
//!
//! Membership is the client's intent ("be subscribed to these streams"), not
//! the server's view. It survives reconnects and is replayed on every
//! transition into `Connected`.

use std::collections::BTreeSet;

use streamline_proto::{OutboundEvent, StreamId};

/// Tracks which rooms the client wants to be subscribed to.
#[derive(Debug, Clone, Default)]
pub struct ChannelSession {
    rooms: BTreeSet<StreamId>,
}

impl ChannelSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `room_id` to membership.
    ///
    /// Returns the `join-room` request to emit if `connected`; otherwise the
    /// join is deferred until [`Self::resubscribe`]. Joining a room that is
    /// already a member returns `None`.
    pub fn join(&mut self, room_id: &str, connected: bool) -> Option<OutboundEvent> {
        let inserted = self.rooms.insert(room_id.to_owned());
        (inserted && connected).then(|| OutboundEvent::join_room(room_id))
    }

    /// Remove `room_id` from membership.
    ///
    /// Returns the `leave-room` request to emit if `connected` and the room
    /// was a member.
    pub fn leave(&mut self, room_id: &str, connected: bool) -> Option<OutboundEvent> {
        let removed = self.rooms.remove(room_id);
        (removed && connected).then(|| OutboundEvent::leave_room(room_id))
    }

    /// One `join-room` request per member, for replay after (re)connecting.
    ///
    /// Each request is independent; the caller emits them one by one and a
    /// failed emit does not affect the others.
    pub fn resubscribe(&self) -> Vec<OutboundEvent> {
        self.rooms.iter().map(OutboundEvent::join_room).collect()
    }

    /// True if `room_id` is a member.
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains(room_id)
    }

    /// Member rooms in sorted order.
    pub fn rooms(&self) -> impl Iterator<Item = &StreamId> {
        self.rooms.iter()
    }

    /// Number of member rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True if no rooms are joined.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_while_disconnected_defers() {
        let mut session = ChannelSession::new();
        assert_eq!(session.join("s1", false), None);
        assert!(session.contains("s1"));
        assert_eq!(session.resubscribe(), vec![OutboundEvent::join_room("s1")]);
    }

    #[test]
    fn join_while_connected_emits_once() {
        let mut session = ChannelSession::new();
        assert_eq!(session.join("s1", true), Some(OutboundEvent::join_room("s1")));
        assert_eq!(session.join("s1", true), None);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn leave_removes_membership() {
        let mut session = ChannelSession::new();
        session.join("s1", false);
        session.join("s2", false);

        assert_eq!(session.leave("s1", true), Some(OutboundEvent::leave_room("s1")));
        assert_eq!(session.leave("s1", true), None);
        assert_eq!(session.resubscribe(), vec![OutboundEvent::join_room("s2")]);
    }

    #[test]
    fn leave_while_disconnected_is_silent() {
        let mut session = ChannelSession::new();
        session.join("s1", false);
        assert_eq!(session.leave("s1", false), None);
        assert!(session.is_empty());
    }

    #[test]
    fn resubscribe_covers_every_room() {
        let mut session = ChannelSession::new();
        for room in ["b", "a", "c"] {
            session.join(room, false);
        }

        let requests = session.resubscribe();
        assert_eq!(requests.len(), 3);
        assert_eq!(session.rooms().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
