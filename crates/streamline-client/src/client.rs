//! Client state machine.
//!
//! The `Client` is the single owner of all realtime state: the connection
//! manager, room membership, live-stream directory, blocklist, identity,
//! slow-mode gates, and one [`StreamSession`] per joined stream. It routes
//! each [`ClientEvent`] to the right component and converts their outputs
//! into [`ClientAction`]s.

use std::collections::{BTreeMap, HashMap, HashSet};

use streamline_core::{
    ChannelSession, ChatConfig, ChatStream, ConnectionAction, ConnectionConfig,
    ConnectionManager, ConnectionState, Environment, IngestOutcome, SendContext, SendRejected,
    SlowModeGate, SlowModeState, TimerAction, TimerId, TimerKind, ViewerCountAggregator,
    ViewerDelta, validate_send,
};
use streamline_proto::{
    ChatMessage, DeleteMessageRequest, Frame, InboundEvent, MessageType, OutboundEvent,
    SendMessageRequest, StreamId, StreamRecord, UserId,
};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent, Notification},
};

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Reconnect policy
    pub connection: ConnectionConfig,
    /// Per-stream chat limits
    pub chat: ChatConfig,
}

/// Per-stream state: chat history and viewer count.
#[derive(Debug, Clone)]
pub struct StreamSession {
    chat: ChatStream,
    viewers: ViewerCountAggregator,
}

impl StreamSession {
    fn new(config: &ChatConfig, blocked: &HashSet<UserId>) -> Self {
        Self {
            chat: ChatStream::with_blocklist(config.clone(), blocked.iter().cloned()),
            viewers: ViewerCountAggregator::new(),
        }
    }

    /// Chat history.
    pub fn chat(&self) -> &ChatStream {
        &self.chat
    }

    /// Current viewer count.
    pub fn viewer_count(&self) -> u64 {
        self.viewers.count()
    }
}

/// Realtime client for a Streamline server.
pub struct Client<E: Environment> {
    /// Environment for message timestamps.
    env: E,

    config: ClientConfig,

    /// Connection lifecycle; sole path to the transport.
    connection: ConnectionManager,

    /// Rooms to (re)subscribe.
    session: ChannelSession,

    /// Joined streams.
    streams: HashMap<StreamId, StreamSession>,

    /// Streams currently live, from `stream-started`/`stream-ended`.
    live: BTreeMap<StreamId, StreamRecord>,

    /// Client-local blocklist, applied to every stream.
    blocked: HashSet<UserId>,

    /// Slow-mode gates, one per stream ever joined. Kept across leave so a
    /// running cooldown survives a rejoin.
    gates: HashMap<StreamId, SlowModeGate>,

    /// Signed-in user.
    identity: Option<UserId>,

    /// Set by `teardown()`. Every later event is a no-op.
    torn_down: bool,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self {
            env,
            connection: ConnectionManager::new(config.connection.clone()),
            config,
            session: ChannelSession::new(),
            streams: HashMap::new(),
            live: BTreeMap::new(),
            blocked: HashSet::new(),
            gates: HashMap::new(),
            identity: None,
            torn_down: false,
        }
    }

    /// Connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection manager (state, attempt, last error).
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Room membership.
    pub fn session(&self) -> &ChannelSession {
        &self.session
    }

    /// Joined stream state. `None` if not joined.
    pub fn stream(&self, stream_id: &str) -> Option<&StreamSession> {
        self.streams.get(stream_id)
    }

    /// Slow-mode state of `stream_id`. Disabled if never joined.
    pub fn slow_mode(&self, stream_id: &str) -> SlowModeState {
        self.gates.get(stream_id).map(SlowModeGate::state).unwrap_or_default()
    }

    /// Streams currently live.
    pub fn live_streams(&self) -> impl Iterator<Item = &StreamRecord> {
        self.live.values()
    }

    /// True if `user_id` is blocked.
    pub fn is_blocked(&self, user_id: &str) -> bool {
        self.blocked.contains(user_id)
    }

    /// True once `teardown()` has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Every timer the client still considers live.
    pub fn live_timers(&self) -> Vec<TimerId> {
        self.connection
            .pending_retry()
            .into_iter()
            .chain(self.gates.values().filter_map(SlowModeGate::pending_tick))
            .cloned()
            .collect()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ClientError::Rejected` if an outbound chat message fails local
    ///   validation
    /// - `ClientError::Connection` if an intent needs a connection
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        if self.torn_down {
            tracing::debug!(?event, "ignoring event after teardown");
            return Ok(Vec::new());
        }

        match event {
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::ConnectError { message } => {
                tracing::warn!(%message, attempt = self.connection.attempt(), "connect failed");
                let actions = self.connection.handle_connect_error(message);
                Ok(self.process_connection_actions(actions))
            },
            ClientEvent::Disconnected { reason } => {
                tracing::info!(%reason, "transport closed");
                let actions = self.connection.handle_disconnect(&reason);
                Ok(self.process_connection_actions(actions))
            },
            ClientEvent::FrameReceived(frame) => Ok(self.handle_frame(&frame)),
            ClientEvent::TimerFired(id) => Ok(self.handle_timer(&id)),
            ClientEvent::Connect(credential) => {
                let actions = self.connection.connect(credential);
                Ok(self.process_connection_actions(actions))
            },
            ClientEvent::Disconnect => {
                let actions = self.connection.disconnect();
                Ok(self.process_connection_actions(actions))
            },
            ClientEvent::CredentialChanged(credential) => {
                let actions = self.connection.sync_credential(credential);
                Ok(self.process_connection_actions(actions))
            },
            ClientEvent::IdentityChanged(identity) => {
                self.identity = identity;
                Ok(Vec::new())
            },
            ClientEvent::JoinStream { stream_id } => self.handle_join(stream_id),
            ClientEvent::LeaveStream { stream_id } => self.handle_leave(&stream_id),
            ClientEvent::SendMessage { stream_id, content, kind } => {
                self.handle_send_message(stream_id, &content, kind)
            },
            ClientEvent::DeleteMessage { stream_id, message_id } => {
                let event =
                    OutboundEvent::DeleteMessage(DeleteMessageRequest { stream_id, message_id });
                let send = self.connection.emit(event)?;
                Ok(self.process_connection_actions(vec![send]))
            },
            ClientEvent::Block { user_id } => Ok(self.handle_block(user_id)),
            ClientEvent::Unblock { user_id } => {
                self.blocked.remove(&user_id);
                for stream in self.streams.values_mut() {
                    stream.chat.unblock(&user_id);
                }
                Ok(Vec::new())
            },
            ClientEvent::ReportScroll { stream_id, distance_from_bottom } => {
                Ok(self.handle_scroll(stream_id, distance_from_bottom))
            },
        }
    }

    /// Cancel every live timer, close the transport, and stop reacting to
    /// events.
    ///
    /// Idempotent; a second call returns no actions.
    pub fn teardown(&mut self) -> Vec<ClientAction> {
        if self.torn_down {
            return Vec::new();
        }

        let disconnect = self.connection.disconnect();
        let mut actions = self.process_connection_actions(disconnect);
        for gate in self.gates.values_mut() {
            if let Some(cancel) = gate.teardown() {
                actions.push(timer_action(cancel));
            }
        }

        self.torn_down = true;
        tracing::debug!(actions = actions.len(), "client torn down");
        actions
    }

    fn handle_connected(&mut self) -> Vec<ClientAction> {
        let actions = self.connection.handle_connected();
        self.process_connection_actions(actions)
    }

    fn handle_join(&mut self, stream_id: StreamId) -> Result<Vec<ClientAction>, ClientError> {
        let connected = self.connection.is_connected();
        let request = self.session.join(&stream_id, connected);

        let config = &self.config.chat;
        let blocked = &self.blocked;
        self.streams
            .entry(stream_id.clone())
            .or_insert_with(|| StreamSession::new(config, blocked));
        self.gates.entry(stream_id.clone()).or_insert_with(|| {
            SlowModeGate::with_cooldown(stream_id.clone(), config.default_cooldown_secs)
        });

        match request {
            Some(event) => {
                let action = self.connection.emit(event)?;
                Ok(self.process_connection_actions(vec![action]))
            },
            None => {
                tracing::debug!(%stream_id, connected, "join deferred or already joined");
                Ok(Vec::new())
            },
        }
    }

    fn handle_leave(&mut self, stream_id: &str) -> Result<Vec<ClientAction>, ClientError> {
        let connected = self.connection.is_connected();
        let request = self.session.leave(stream_id, connected);

        // The gate stays: its countdown keeps running for a later rejoin.
        self.streams.remove(stream_id);

        match request {
            Some(event) => {
                let action = self.connection.emit(event)?;
                Ok(self.process_connection_actions(vec![action]))
            },
            None => Ok(Vec::new()),
        }
    }

    fn handle_send_message(
        &mut self,
        stream_id: StreamId,
        content: &str,
        kind: MessageType,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let ctx = SendContext {
            connected: self.connection.is_connected(),
            has_identity: self.identity.is_some(),
            gate: self.gates.get(&stream_id),
        };

        let content = match validate_send(content, &ctx) {
            Ok(trimmed) => trimmed.to_owned(),
            Err(reason) => {
                tracing::debug!(%stream_id, %reason, "send rejected locally");
                return Err(reason.into());
            },
        };
        if !self.streams.contains_key(&stream_id) {
            return Err(SendRejected::NotJoined(stream_id).into());
        }

        let event = OutboundEvent::SendMessage(SendMessageRequest {
            stream_id: stream_id.clone(),
            content,
            kind,
            timestamp: self.env.wall_clock_millis(),
        });
        let send = self.connection.emit(event)?;
        let mut actions = self.process_connection_actions(vec![send]);

        if let Some(gate) = self.gates.get_mut(&stream_id) {
            let timers = gate.on_sent();
            if !timers.is_empty() {
                actions.extend(timers.into_iter().map(timer_action));
                actions.push(ClientAction::Notify(Notification::SlowMode {
                    stream_id,
                    state: gate.state(),
                }));
            }
        }
        Ok(actions)
    }

    fn handle_block(&mut self, user_id: UserId) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        for (stream_id, stream) in &mut self.streams {
            let removed = stream.chat.block(&user_id);
            if !removed.is_empty() {
                actions.push(ClientAction::Notify(Notification::ChatMessagesRemoved {
                    stream_id: stream_id.clone(),
                    message_ids: removed,
                }));
            }
        }
        self.blocked.insert(user_id);
        actions
    }

    fn handle_scroll(&mut self, stream_id: StreamId, distance: u32) -> Vec<ClientAction> {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return Vec::new();
        };

        let before = stream.chat.unread_count();
        stream.chat.report_scroll(distance);
        let unread = stream.chat.unread_count();

        if unread == before {
            return Vec::new();
        }
        vec![ClientAction::Notify(Notification::UnreadChanged { stream_id, unread })]
    }

    fn handle_timer(&mut self, id: &TimerId) -> Vec<ClientAction> {
        match id.kind() {
            TimerKind::Reconnect => {
                let actions = self.connection.handle_timer(id);
                self.process_connection_actions(actions)
            },
            TimerKind::SlowMode(stream_id) => {
                let Some(gate) = self.gates.get_mut(stream_id) else {
                    tracing::trace!(%stream_id, "slow-mode tick for an unknown stream");
                    return Vec::new();
                };

                let before = gate.state();
                let mut actions: Vec<_> = gate.handle_tick(id).into_iter().map(timer_action).collect();
                let state = gate.state();
                if state != before {
                    actions.push(ClientAction::Notify(Notification::SlowMode {
                        stream_id: stream_id.clone(),
                        state,
                    }));
                }
                actions
            },
        }
    }

    fn handle_frame(&mut self, frame: &Frame) -> Vec<ClientAction> {
        let event = match InboundEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(event = %frame.event, error = %e, "dropping undecodable frame");
                return Vec::new();
            },
        };

        tracing::trace!(event = event.name(), "inbound event");

        match event {
            InboundEvent::AuthError(notice) => {
                tracing::warn!(message = %notice.message, "credential rejected");
                let actions = self.connection.handle_auth_error(notice.message);
                self.process_connection_actions(actions)
            },
            InboundEvent::RateLimit(notice) => {
                tracing::warn!(message = %notice.message, retry_after = ?notice.retry_after, "rate limited");
                let actions = self.connection.handle_rate_limit(notice.message, notice.retry_after);
                self.process_connection_actions(actions)
            },
            InboundEvent::StreamStarted(record) => {
                self.live.insert(record.id.clone(), record.clone());
                vec![ClientAction::Notify(Notification::StreamStarted(record))]
            },
            InboundEvent::StreamEnded(stream) => {
                if self.live.remove(&stream.stream_id).is_none() {
                    return Vec::new();
                }
                vec![ClientAction::Notify(Notification::StreamEnded { stream_id: stream.stream_id })]
            },
            InboundEvent::ViewerCountUpdate(update) => {
                let snapshot = update.viewer_count;
                self.with_viewers(update.stream_id, |v| v.apply_snapshot(snapshot))
            },
            InboundEvent::ViewerJoined(stream) => {
                self.with_viewers(stream.stream_id, |v| v.apply_delta(ViewerDelta::Join))
            },
            InboundEvent::ViewerLeft(stream) => {
                self.with_viewers(stream.stream_id, |v| v.apply_delta(ViewerDelta::Leave))
            },
            InboundEvent::NewMessage(new) => self.ingest(new.stream_id, new.message),
            InboundEvent::MessageDeleted(deleted) => {
                let Some(stream) = self.streams.get_mut(&deleted.stream_id) else {
                    return Vec::new();
                };
                if !stream.chat.delete(&deleted.message_id) {
                    return Vec::new();
                }
                vec![ClientAction::Notify(Notification::ChatMessagesRemoved {
                    stream_id: deleted.stream_id,
                    message_ids: vec![deleted.message_id],
                })]
            },
            InboundEvent::UserBanned(banned) => {
                let Some(stream) = self.streams.get_mut(&banned.stream_id) else {
                    return Vec::new();
                };
                let removed = stream.chat.purge_user(&banned.user_id);
                tracing::debug!(stream_id = %banned.stream_id, user_id = %banned.user_id, removed = removed.len(), "user banned");
                if removed.is_empty() {
                    return Vec::new();
                }
                vec![ClientAction::Notify(Notification::ChatMessagesRemoved {
                    stream_id: banned.stream_id,
                    message_ids: removed,
                })]
            },
            InboundEvent::SlowModeToggle(toggle) => {
                let Some(gate) = self.gates.get_mut(&toggle.stream_id) else {
                    return Vec::new();
                };
                tracing::info!(stream_id = %toggle.stream_id, enabled = toggle.enabled, duration = toggle.duration, "slow mode toggled");
                let mut actions: Vec<_> =
                    gate.toggle(toggle.enabled, toggle.duration).into_iter().map(timer_action).collect();
                actions.push(ClientAction::Notify(Notification::SlowMode {
                    stream_id: toggle.stream_id,
                    state: gate.state(),
                }));
                actions
            },
        }
    }

    fn ingest(&mut self, stream_id: StreamId, message: ChatMessage) -> Vec<ClientAction> {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            tracing::trace!(%stream_id, "message for a stream we have not joined");
            return Vec::new();
        };
        if stream.chat.is_blocked(&message.user_id) {
            return Vec::new();
        }

        match stream.chat.ingest(message.clone()) {
            IngestOutcome::Appended { evicted } => {
                let mut actions = Vec::with_capacity(2);
                if !evicted.is_empty() {
                    actions.push(ClientAction::Notify(Notification::ChatMessagesRemoved {
                        stream_id: stream_id.clone(),
                        message_ids: evicted.into_iter().map(|m| m.id).collect(),
                    }));
                }
                actions.push(ClientAction::Notify(Notification::ChatMessage {
                    stream_id,
                    message,
                    unread: stream.chat.unread_count(),
                }));
                actions
            },
            IngestOutcome::Blocked | IngestOutcome::Duplicate => Vec::new(),
        }
    }

    fn with_viewers(
        &mut self,
        stream_id: StreamId,
        apply: impl FnOnce(&mut ViewerCountAggregator) -> u64,
    ) -> Vec<ClientAction> {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return Vec::new();
        };
        let before = stream.viewers.count();
        let count = apply(&mut stream.viewers);
        if count == before {
            return Vec::new();
        }
        vec![ClientAction::Notify(Notification::ViewerCount { stream_id, count })]
    }

    /// Convert connection actions into client actions.
    ///
    /// A transition into `Connected` replays membership: one `join-room` per
    /// room, each emitted on its own so one failure does not block the rest.
    fn process_connection_actions(&mut self, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                ConnectionAction::OpenTransport { credential } => {
                    out.push(ClientAction::OpenTransport { credential });
                },
                ConnectionAction::CloseTransport => out.push(ClientAction::CloseTransport),
                ConnectionAction::Send(event) => out.extend(encode(event)),
                ConnectionAction::Timer(timer) => out.push(timer_action(timer)),
                ConnectionAction::StateChanged { from, to } => {
                    tracing::info!(?from, ?to, attempt = self.connection.attempt(), "connection state changed");
                    out.push(ClientAction::Notify(Notification::ConnectionChanged { from, to }));
                    if to == ConnectionState::Connected {
                        out.extend(self.resubscribe());
                    }
                },
                ConnectionAction::Error(error) => {
                    tracing::warn!(%error, "connection error");
                    out.push(ClientAction::Notify(Notification::ConnectionFailed(error)));
                },
                ConnectionAction::Warning(warning) => {
                    out.push(ClientAction::Notify(Notification::RateLimited(warning)));
                },
            }
        }

        out
    }

    fn resubscribe(&self) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(self.session.len());
        for event in self.session.resubscribe() {
            match self.connection.emit(event) {
                Ok(ConnectionAction::Send(event)) => out.extend(encode(event)),
                Ok(_) => {},
                Err(e) => tracing::warn!(error = %e, "failed to rejoin room"),
            }
        }
        tracing::debug!(rooms = out.len(), "resubscribed");
        out
    }
}

fn encode(event: OutboundEvent) -> Option<ClientAction> {
    let name = event.name();
    match event.into_frame() {
        Ok(frame) => Some(ClientAction::Send(frame)),
        Err(e) => {
            tracing::error!(event = name, error = %e, "failed to encode outbound event");
            None
        },
    }
}

fn timer_action(action: TimerAction) -> ClientAction {
    match action {
        TimerAction::Schedule { id, delay } => ClientAction::ScheduleTimer { id, delay },
        TimerAction::Cancel { id } => ClientAction::CancelTimer { id },
    }
}
