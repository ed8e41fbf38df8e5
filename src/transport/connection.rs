//! WebSocket connection and event loop.
//!
//! This module owns the single WebSocket to a DevTools endpoint: command
//! correlation, session routing and event fan-out all run through one
//! reader/writer task.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Outgoing command frames, written in submission order
//! - Incoming replies, routed to the waiting caller by command id
//! - Incoming events, routed to matching subscriptions
//! - `Target.attachedToTarget` / `Target.detachedFromTarget` bookkeeping
//!
//! When the socket closes or fails, every pending command resolves with
//! [`Error::ConnectionClosed`] and every subscription ends.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, trace, warn};

use crate::domains::{DomainGraph, DomainResolver};
use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId, TargetId};
use crate::protocol::target::{
    AttachToTarget, AttachToTargetResponse, AttachedToTarget, DetachFromTarget, DetachedFromTarget,
};
use crate::protocol::{
    Command, CommandRequest, Event, EventPattern, InboundFrame, Response, TypedEvent, encode_params,
};

use super::correlator::{CompletionRx, Correlator, PendingGuard, PendingKind};
use super::events::{EventBus, EventStream, SessionScope, Subscription};
use super::options::{ConnectionBuilder, ConnectionOptions};
use super::sessions::{SessionHandle, SessionInfo, SessionRegistry};
use super::CommandChannel;

// ============================================================================
// Outbound
// ============================================================================

/// Internal messages for the event loop.
enum Outbound {
    /// Write one serialized command.
    Frame { id: CommandId, text: String },
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the handles and the event loop.
pub(crate) struct Shared {
    pub(crate) correlator: Correlator,
    pub(crate) sessions: SessionRegistry,
    pub(crate) events: EventBus,
}

impl Shared {
    /// Classifies and routes one inbound text frame.
    fn dispatch(&self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping unparsable frame");
                return;
            }
        };

        if let Some(session_id) = frame.session_id()
            && !self.sessions.contains(session_id)
        {
            warn!(session_id = %session_id, "Dropping frame for unknown session");
            return;
        }

        match frame {
            InboundFrame::Response(response) => self.dispatch_response(response),
            InboundFrame::Event(event) => self.dispatch_event(event),
        }
    }

    fn dispatch_response(&self, response: Response) {
        let Some(pending) = self.correlator.take(response.id) else {
            warn!(id = %response.id, "Reply for unknown command");
            return;
        };

        trace!(id = %response.id, method = %pending.method, success = response.is_success(), "Reply received");

        let parent = response.session_id.clone();
        let result = response.into_result(&pending.method);

        // The session must be routable before the caller can use it.
        if let (PendingKind::Attach { target_id }, Ok(value)) = (&pending.kind, &result)
            && let Some(session_id) = value.get("sessionId").and_then(Value::as_str)
        {
            self.sessions.insert(SessionInfo {
                session_id: SessionId::from(session_id),
                target_id: target_id.clone(),
                parent_session_id: parent,
            });
        }

        pending.complete(result);
    }

    fn dispatch_event(&self, event: Event) {
        if event.method == AttachedToTarget::METHOD {
            match event.decode::<AttachedToTarget>() {
                Ok(attached) => {
                    self.sessions.insert(SessionInfo {
                        session_id: attached.session_id,
                        target_id: attached.target_info.target_id,
                        parent_session_id: event.session_id.clone(),
                    });
                }
                Err(e) => warn!(error = %e, "Malformed attachedToTarget"),
            }
        } else if event.method == DetachedFromTarget::METHOD {
            match event.decode::<DetachedFromTarget>() {
                Ok(detached) => {
                    self.release_session(&detached.session_id);
                }
                Err(e) => warn!(error = %e, "Malformed detachedFromTarget"),
            }
        }

        let method = event.method.clone();
        let delivered = self.events.publish(event);
        trace!(method = %method, delivered, "Event dispatched");
    }

    /// Forgets a session and its children: pending commands fail with
    /// `SessionDetached` and scoped subscriptions end.
    pub(crate) fn release_session(&self, session_id: &SessionId) -> Vec<SessionInfo> {
        let removed = self.sessions.remove_tree(session_id);
        for info in &removed {
            self.correlator.fail_session(&info.session_id);
            self.events.close_session(&info.session_id);
            debug!(session_id = %info.session_id, target_id = %info.target_id, "Session released");
        }
        removed
    }

    /// Tears everything down after the socket is gone.
    fn close(&self) {
        let failed = self.correlator.close();
        let sessions = self.sessions.clear();
        self.events.close();
        info!(failed, sessions, "Connection closed");
    }
}

// ============================================================================
// Connection
// ============================================================================

struct Inner {
    /// Channel to the event loop.
    outbound: mpsc::UnboundedSender<Outbound>,
    /// State shared with the event loop.
    shared: Arc<Shared>,
    /// Enabled domains of the root session.
    root_domains: DomainResolver,
    /// Domain declarations shared by every session.
    graph: Arc<RwLock<DomainGraph>>,
    /// Time a command waits for its reply.
    command_timeout: Option<Duration>,
    /// Flips to `true` when the event loop ends.
    closed: watch::Receiver<bool>,
}

/// Connection to a DevTools WebSocket endpoint.
///
/// Multiplexes commands of the root session and of every attached session
/// over one socket. The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone. The event loop stops
/// when [`Connection::close`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Returns a builder for a new connection.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connects to `url` with default options.
    ///
    /// # Errors
    ///
    /// See [`ConnectionBuilder::connect`].
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        ConnectionBuilder::new().url(url).connect().await
    }

    /// Starts a connection over an established WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn from_stream<S>(ws_stream: S, options: ConnectionOptions) -> Self
    where
        S: Stream<Item = std::result::Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Unpin
            + Send
            + 'static,
    {
        let graph = Arc::new(RwLock::new(options.domain_graph));
        let shared = Arc::new(Shared {
            correlator: Correlator::new(options.max_pending),
            sessions: SessionRegistry::new(Arc::clone(&graph)),
            events: EventBus::new(),
        });

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed) = watch::channel(false);

        tokio::spawn(run_event_loop(
            ws_stream,
            outbound_rx,
            Arc::clone(&shared),
            closed_tx,
        ));

        Self {
            inner: Arc::new(Inner {
                outbound,
                shared,
                root_domains: DomainResolver::new(Arc::clone(&graph)),
                graph,
                command_timeout: options.command_timeout,
                closed,
            }),
        }
    }
}

// ============================================================================
// Connection - Commands
// ============================================================================

impl Connection {
    /// Sends a raw command on the root session and awaits its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the remote end answered with an error
    /// - [`Error::RequestTimeout`] if no reply arrived in time
    /// - [`Error::ConnectionClosed`] if the connection closed
    /// - [`Error::TooManyPending`] if too many commands are in flight
    pub async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.execute(None, method, params, PendingKind::Plain).await
    }

    /// Sends a command with serializable params and decodes the result.
    ///
    /// # Errors
    ///
    /// As [`Connection::call_raw`], plus [`Error::Decode`] if the result
    /// does not match `T`.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_on(None, method, params).await
    }

    /// Sends a typed command on the root session.
    ///
    /// # Errors
    ///
    /// As [`Connection::call`].
    pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.send_on(None, command).await
    }

    pub(crate) async fn call_on<P, T>(
        &self,
        session_id: Option<&SessionId>,
        method: &str,
        params: &P,
    ) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let params = encode_params(params)?;
        let value = self
            .execute(session_id, method, params, PendingKind::Plain)
            .await?;
        decode_result(method, value)
    }

    pub(crate) async fn send_on<C: Command>(
        &self,
        session_id: Option<&SessionId>,
        command: &C,
    ) -> Result<C::Response> {
        self.call_on(session_id, C::METHOD, command).await
    }

    /// Registers, writes and awaits one command.
    pub(crate) async fn execute(
        &self,
        session_id: Option<&SessionId>,
        method: &str,
        params: Option<Value>,
        kind: PendingKind,
    ) -> Result<Value> {
        let shared = &self.inner.shared;
        let (id, rx) = shared
            .correlator
            .register(method, session_id.cloned(), kind)?;
        let _guard = PendingGuard::new(&shared.correlator, id);

        match session_id {
            Some(session_id) if !shared.sessions.contains(session_id) => {
                shared
                    .correlator
                    .fail(id, Error::session_detached(session_id.clone()));
            }
            _ => {
                let request = CommandRequest::new(id, session_id.cloned(), method, params);
                match serde_json::to_string(&request) {
                    Ok(text) => {
                        if self.inner.outbound.send(Outbound::Frame { id, text }).is_err() {
                            shared.correlator.fail(id, Error::ConnectionClosed);
                        }
                    }
                    Err(e) => shared.correlator.fail(id, Error::Json(e)),
                }
            }
        }

        self.await_reply(id, rx).await
    }

    async fn await_reply(&self, id: CommandId, mut rx: CompletionRx) -> Result<Value> {
        let Some(limit) = self.inner.command_timeout else {
            return rx.await.unwrap_or(Err(Error::ConnectionClosed));
        };

        match timeout(limit, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                if self.inner.shared.correlator.remove(id) {
                    let timeout_ms = duration_ms(limit);
                    debug!(%id, timeout_ms, "Command timed out");
                    Err(Error::request_timeout(id, timeout_ms))
                } else {
                    // The reader claimed the entry first; its result is on the way.
                    rx.await.unwrap_or(Err(Error::ConnectionClosed))
                }
            }
        }
    }

    /// Returns the number of commands in flight.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.shared.correlator.pending_count()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner.shared
    }
}

// ============================================================================
// Connection - Events
// ============================================================================

impl Connection {
    /// Subscribes to root-session events matching `pattern`.
    pub fn subscribe(&self, pattern: impl Into<EventPattern>) -> Subscription {
        self.subscribe_scoped(pattern.into(), SessionScope::Root)
    }

    /// Subscribes to events matching `pattern` within `scope`.
    pub fn subscribe_scoped(&self, pattern: EventPattern, scope: SessionScope) -> Subscription {
        self.inner.shared.events.subscribe(pattern, scope)
    }

    /// Subscribes to one typed event of the root session.
    pub fn events<E: TypedEvent>(&self) -> EventStream<E> {
        self.subscribe(EventPattern::parse(E::METHOD)).typed()
    }
}

// ============================================================================
// Connection - Sessions
// ============================================================================

impl Connection {
    /// Attaches to a target in flat mode.
    ///
    /// The session is routable by the time this returns.
    ///
    /// # Errors
    ///
    /// As [`Connection::call`].
    pub async fn attach(&self, target_id: &TargetId) -> Result<SessionHandle> {
        self.attach_on(None, target_id).await
    }

    pub(crate) async fn attach_on(
        &self,
        parent: Option<&SessionId>,
        target_id: &TargetId,
    ) -> Result<SessionHandle> {
        let command = AttachToTarget {
            target_id: target_id.clone(),
            flatten: true,
        };
        let params = encode_params(&command)?;
        let kind = PendingKind::Attach {
            target_id: target_id.clone(),
        };

        let value = self
            .execute(parent, AttachToTarget::METHOD, params, kind)
            .await?;
        let reply: AttachToTargetResponse = decode_result(AttachToTarget::METHOD, value)?;

        // Detached again before the caller saw it.
        self.session(&reply.session_id)
            .map_err(|_| Error::session_detached(reply.session_id))
    }

    /// Returns a handle for an attached session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if the session is not attached.
    pub fn session(&self, session_id: &SessionId) -> Result<SessionHandle> {
        let (info, domains) = self
            .inner
            .shared
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::unknown_session(session_id.clone()))?;
        Ok(SessionHandle::new(self.clone(), info, domains))
    }

    /// Returns every attached session.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner.shared.sessions.list()
    }

    /// Detaches a session and every session attached through it.
    ///
    /// Pending commands of those sessions fail with
    /// [`Error::SessionDetached`] before `Target.detachFromTarget` is sent.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownSession`] if the session is not attached
    /// - errors of the `Target.detachFromTarget` command
    pub async fn detach(&self, session_id: &SessionId) -> Result<()> {
        if self.inner.shared.release_session(session_id).is_empty() {
            return Err(Error::unknown_session(session_id.clone()));
        }

        self.send(&DetachFromTarget {
            session_id: session_id.clone(),
        })
        .await?;
        Ok(())
    }

    /// Forgets a session without telling the remote end.
    pub(crate) fn release(&self, session_id: &SessionId) {
        self.inner.shared.release_session(session_id);
    }
}

// ============================================================================
// Connection - Domains
// ============================================================================

impl Connection {
    /// Declares the dependencies of `domain` for every session.
    pub fn declare_dependencies<I, S>(&self, domain: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.graph.write().declare(domain, dependencies);
    }

    /// Enables `domain` and its dependencies on the root session.
    ///
    /// # Errors
    ///
    /// See [`DomainResolver::ensure_enabled`].
    pub async fn ensure_enabled(&self, domain: &str) -> Result<()> {
        self.inner.root_domains.ensure_enabled(self, domain).await
    }

    /// Returns `true` if `domain` is enabled on the root session.
    #[must_use]
    pub fn is_enabled(&self, domain: &str) -> bool {
        self.inner.root_domains.is_enabled(domain)
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Returns `true` once the event loop stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Waits until the event loop stopped.
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.clone();
        // Err means the loop already dropped its sender, i.e. it stopped.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Closes the socket and waits for the event loop to stop.
    ///
    /// Pending commands fail with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        let _ = self.inner.outbound.send(Outbound::Shutdown);
        self.closed().await;
    }
}

#[async_trait]
impl CommandChannel for Connection {
    async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        Connection::call_raw(self, method, params).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("sessions", &self.inner.shared.sessions.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Decodes a command result, keeping the raw payload on failure.
fn decode_result<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    match T::deserialize(&value) {
        Ok(decoded) => Ok(decoded),
        Err(source) => Err(Error::decode(method, value, source)),
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop that handles WebSocket I/O.
async fn run_event_loop<S>(
    ws_stream: S,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<Shared>,
    closed_tx: watch::Sender<bool>,
) where
    S: Stream<Item = std::result::Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();
    debug!("Event loop started");

    loop {
        tokio::select! {
            // Incoming frames from the remote end
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => shared.dispatch(text.as_str()),

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the handles
            command = outbound_rx.recv() => {
                match command {
                    Some(Outbound::Frame { id, text }) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(%id, error = %e, "Failed to write command");
                            shared.correlator.fail(id, Error::connection(e.to_string()));
                            break;
                        }
                        trace!(%id, "Command sent");
                    }

                    Some(Outbound::Shutdown) => {
                        debug!("Shutdown requested");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!("All connection handles dropped");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    shared.close();
    let _ = closed_tx.send(true);

    debug!("Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
