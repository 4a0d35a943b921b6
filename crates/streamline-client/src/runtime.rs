//! Async runtime for the client.
//!
//! The Runtime drives the client event loop, coordinating between:
//! - [`Client`]: realtime state machine
//! - [`Transport`]: platform-specific I/O
//! - timer tasks: one tokio task per scheduled [`TimerId`]
//!
//! Callers interact through a [`RuntimeHandle`]: intents go in as
//! [`ClientEvent`]s, state changes come out as [`Notification`]s on a broadcast
//! channel. A [`Subscription`] unsubscribes when dropped.

use std::{collections::HashMap, future::Future, time::Duration};

use streamline_core::{Environment, TimerId, Token};
use streamline_proto::{Frame, MessageType, StreamId};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    client::{Client, ClientConfig},
    error::{RuntimeError, TransportError},
    event::{ClientAction, ClientEvent, Notification},
};

/// Queued commands per handle before senders wait.
const COMMAND_CAPACITY: usize = 64;

/// Notifications buffered per subscriber before it starts lagging.
const NOTIFICATION_CAPACITY: usize = 256;

/// Event surfaced by an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Frame received from the server.
    Frame(Frame),
    /// Transport closed by the remote end or the network.
    Closed {
        /// Close reason (e.g. `"io server disconnect"`, `"ping timeout"`).
        reason: String,
    },
}

/// Abstracts the realtime transport.
///
/// Implementations own the connection; the runtime calls them only in
/// response to [`ClientAction`]s, so nothing else touches the transport.
///
/// # Implementations
///
/// - **QUIC**: `transport::QuicTransport` (`transport` feature)
/// - **Tests**: scripted in-memory transports
pub trait Transport: Send + 'static {
    /// Open the transport, presenting `credential` in the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn open(
        &mut self,
        credential: &Token,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a frame over the open transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the write fails.
    fn send(&mut self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next event from the open transport.
    ///
    /// Only polled while open. Must be cancel-safe.
    fn recv(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Close the transport. No-op if already closed.
    fn close(&mut self);
}

enum Command {
    Event(ClientEvent),
    Shutdown,
}

/// Cloneable handle for feeding intents into a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<Notification>,
}

impl RuntimeHandle {
    /// Queue an event for the client.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime loop has exited.
    pub async fn send(&self, event: ClientEvent) -> Result<(), RuntimeError> {
        self.commands.send(Command::Event(event)).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Connect with `credential`.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime loop has exited.
    pub async fn connect(&self, credential: impl Into<Token>) -> Result<(), RuntimeError> {
        self.send(ClientEvent::Connect(credential.into())).await
    }

    /// Join a stream (deferred until connected).
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime loop has exited.
    pub async fn join_stream(&self, stream_id: impl Into<StreamId>) -> Result<(), RuntimeError> {
        self.send(ClientEvent::JoinStream { stream_id: stream_id.into() }).await
    }

    /// Post a text message. Local rejections arrive as
    /// [`Notification::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime loop has exited.
    pub async fn send_message(
        &self,
        stream_id: impl Into<StreamId>,
        content: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.send(ClientEvent::SendMessage {
            stream_id: stream_id.into(),
            content: content.into(),
            kind: MessageType::Text,
        })
        .await
    }

    /// Tear the client down and stop the runtime loop.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Stopped` if the runtime loop has already exited.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands.send(Command::Shutdown).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Subscribe to notifications. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.notifications.subscribe() }
    }

    /// Live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.notifications.receiver_count()
    }
}

/// Notification stream for one subscriber.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    /// Next notification. `None` once the runtime and every handle are gone.
    ///
    /// A subscriber that falls behind skips the oldest notifications.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, notifications dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Async driver that owns the client, the transport, and every timer task.
///
/// # Type Parameters
///
/// - `T`: transport implementation
/// - `E`: environment providing time and sleeping
pub struct Runtime<T, E>
where
    T: Transport,
    E: Environment,
{
    client: Client<E>,
    transport: T,
    env: E,
    transport_open: bool,
    timers: HashMap<TimerId, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
    fired_rx: mpsc::UnboundedReceiver<TimerId>,
    commands: mpsc::Receiver<Command>,
    notifications: broadcast::Sender<Notification>,
}

impl<T, E> Runtime<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    pub fn new(transport: T, env: E, config: ClientConfig) -> (Self, RuntimeHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();

        let handle = RuntimeHandle { commands: commands_tx, notifications: notifications.clone() };
        let runtime = Self {
            client: Client::new(env.clone(), config),
            transport,
            env,
            transport_open: false,
            timers: HashMap::new(),
            fired_tx,
            fired_rx,
            commands,
            notifications,
        };
        (runtime, handle)
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    ///
    /// Events are processed one at a time, each to completion, in arrival
    /// order per source.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Event(event)) => self.dispatch(event).await,
                    Some(Command::Shutdown) | None => break,
                },
                Some(id) = self.fired_rx.recv() => {
                    self.timers.remove(&id);
                    self.dispatch(ClientEvent::TimerFired(id)).await;
                },
                event = self.transport.recv(), if self.transport_open => {
                    let event = match event {
                        TransportEvent::Frame(frame) => ClientEvent::FrameReceived(frame),
                        TransportEvent::Closed { reason } => {
                            self.transport_open = false;
                            ClientEvent::Disconnected { reason }
                        },
                    };
                    self.dispatch(event).await;
                },
            }
        }

        self.shutdown().await;
    }

    /// The client state machine.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Timer tasks still scheduled. Zero after shutdown.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Feed one event and everything it causes (transport open results) to
    /// the client.
    async fn dispatch(&mut self, event: ClientEvent) {
        let mut pending = std::collections::VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let actions = match self.client.handle(event) {
                Ok(actions) => actions,
                Err(e) => {
                    tracing::debug!(error = %e, "intent rejected");
                    self.publish(Notification::Rejected(e));
                    continue;
                },
            };

            for action in actions {
                if let Some(follow_up) = self.execute(action).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    /// Execute one action. Returns the transport's answer to an open.
    async fn execute(&mut self, action: ClientAction) -> Option<ClientEvent> {
        match action {
            ClientAction::OpenTransport { credential } => {
                if self.transport_open {
                    self.transport.close();
                    self.transport_open = false;
                }
                let started = self.env.now();
                let result = self.transport.open(&credential).await;
                let elapsed = self.env.now() - started;
                match result {
                    Ok(()) => {
                        tracing::debug!(?elapsed, "transport open");
                        self.transport_open = true;
                        Some(ClientEvent::Connected)
                    },
                    Err(e) => {
                        tracing::debug!(?elapsed, error = %e, "transport open failed");
                        Some(ClientEvent::ConnectError { message: e.to_string() })
                    },
                }
            },
            ClientAction::CloseTransport => {
                self.transport.close();
                self.transport_open = false;
                None
            },
            ClientAction::Send(frame) => {
                if let Err(e) = self.transport.send(frame).await {
                    // The transport reports the loss as `Closed`; nothing to retry here.
                    tracing::warn!(error = %e, "send failed");
                }
                None
            },
            ClientAction::ScheduleTimer { id, delay } => {
                self.schedule(id, delay);
                None
            },
            ClientAction::CancelTimer { id } => {
                if let Some(task) = self.timers.remove(&id) {
                    task.abort();
                }
                None
            },
            ClientAction::Notify(notification) => {
                self.publish(notification);
                None
            },
        }
    }

    fn schedule(&mut self, id: TimerId, delay: Duration) {
        let env = self.env.clone();
        let fired = self.fired_tx.clone();
        let timer_id = id.clone();

        let task = tokio::spawn(async move {
            env.sleep(delay).await;
            // Receiver gone means the runtime stopped; the firing is moot.
            let _ = fired.send(timer_id);
        });

        if let Some(previous) = self.timers.insert(id, task) {
            previous.abort();
        }
    }

    fn publish(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    async fn shutdown(&mut self) {
        for action in self.client.teardown() {
            // Teardown never opens the transport, so there is no follow-up.
            let _ = self.execute(action).await;
        }

        for (_, task) in self.timers.drain() {
            task.abort();
        }
        if self.transport_open {
            self.transport.close();
            self.transport_open = false;
        }
        tracing::debug!("runtime stopped");
    }
}
