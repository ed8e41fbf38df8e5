//! Event fan-out.
//!
//! The [`EventBus`] delivers every inbound event to all subscriptions whose
//! pattern and session scope match it. Each subscription owns an unbounded
//! queue, so a slow consumer never stalls the reader loop or its siblings.
//!
//! # Example
//!
//! ```ignore
//! let mut loads = connection.subscribe("Page.loadEventFired");
//! while let Some(event) = loads.recv().await {
//!     println!("loaded at {}", event.params["timestamp"]);
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::{SessionId, SubscriptionId};
use crate::protocol::{Event, EventPattern, TypedEvent};

// ============================================================================
// SessionScope
// ============================================================================

/// Which sessions a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SessionScope {
    /// Events from every session, root included.
    Any,
    /// Events without a session id only.
    #[default]
    Root,
    /// Events of one session only.
    Session(SessionId),
}

impl SessionScope {
    /// Returns `true` if an event tagged with `session_id` is in scope.
    #[must_use]
    pub fn matches(&self, session_id: Option<&SessionId>) -> bool {
        match self {
            Self::Any => true,
            Self::Root => session_id.is_none(),
            Self::Session(id) => session_id == Some(id),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A registered subscription.
struct Subscriber {
    pattern: EventPattern,
    scope: SessionScope,
    sender: mpsc::UnboundedSender<Arc<Event>>,
}

#[derive(Default)]
struct Registry {
    subscribers: FxHashMap<SubscriptionId, Subscriber>,
    closed: bool,
}

// ============================================================================
// EventBus
// ============================================================================

/// Subscription registry of one connection.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription.
    ///
    /// On a closed bus the returned subscription is already ended.
    pub fn subscribe(&self, pattern: EventPattern, scope: SessionScope) -> Subscription {
        let id = SubscriptionId::next();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut registry = self.registry.lock();
        if registry.closed {
            debug!(subscription = %id, "Subscribed on closed event bus");
        } else {
            trace!(subscription = %id, pattern = %pattern, ?scope, "Subscription added");
            registry.subscribers.insert(
                id,
                Subscriber {
                    pattern: pattern.clone(),
                    scope: scope.clone(),
                    sender,
                },
            );
        }

        Subscription {
            id,
            pattern,
            scope,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers an event to every matching subscription.
    ///
    /// Subscriptions whose consumer is gone are pruned. Returns the number
    /// of subscriptions the event was delivered to.
    pub fn publish(&self, event: Event) -> usize {
        let event = Arc::new(event);
        let mut registry = self.registry.lock();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, subscriber) in &registry.subscribers {
            if !subscriber.scope.matches(event.session_id.as_ref())
                || !subscriber.pattern.matches(&event)
            {
                continue;
            }
            if subscriber.sender.send(Arc::clone(&event)).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            registry.subscribers.remove(&id);
        }

        delivered
    }

    /// Ends every subscription scoped to `session_id`.
    pub fn close_session(&self, session_id: &SessionId) -> usize {
        let mut registry = self.registry.lock();
        let before = registry.subscribers.len();
        registry
            .subscribers
            .retain(|_, subscriber| !matches!(&subscriber.scope, SessionScope::Session(id) if id == session_id));
        before - registry.subscribers.len()
    }

    /// Ends every subscription and rejects new ones.
    pub fn close(&self) {
        let mut registry = self.registry.lock();
        registry.closed = true;
        let count = registry.subscribers.len();
        registry.subscribers.clear();
        if count > 0 {
            debug!(count, "Ended subscriptions on shutdown");
        }
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A live stream of raw events.
///
/// Ends when the connection closes or, for session-scoped subscriptions,
/// when the session detaches. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    scope: SessionScope,
    receiver: mpsc::UnboundedReceiver<Arc<Event>>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the pattern this subscription filters on.
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &EventPattern {
        &self.pattern
    }

    /// Returns the session scope.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    /// Receives the next event, or `None` once the subscription ended.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    /// Decodes every event into `E`.
    #[must_use]
    pub fn typed<E: TypedEvent>(self) -> EventStream<E> {
        EventStream {
            subscription: self,
            _marker: PhantomData,
        }
    }
}

impl Stream for Subscription {
    type Item = Arc<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade()
            && registry.lock().subscribers.remove(&self.id).is_some()
        {
            trace!(subscription = %self.id, "Subscription removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// A subscription decoding each event into `E`.
///
/// A payload that fails to decode yields an `Err` item; the stream itself
/// continues.
pub struct EventStream<E> {
    subscription: Subscription,
    _marker: PhantomData<fn() -> E>,
}

impl<E: TypedEvent> EventStream<E> {
    /// Receives and decodes the next event.
    pub async fn recv(&mut self) -> Option<Result<E>> {
        self.subscription.recv().await.map(|event| event.decode())
    }

    /// Returns the underlying subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }
}

impl<E: TypedEvent> Stream for EventStream<E> {
    type Item = Result<E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.subscription)
            .poll_next(cx)
            .map(|event| event.map(|event| event.decode()))
    }
}

// ============================================================================
// Tests
// ============================================================================
