//! Flat-mode session multiplexing.
//!
//! Every target attached with `flatten: true` gets a session id, and every
//! frame for that target carries it. One connection therefore serves the
//! browser (root session) and any number of target sessions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            SessionRegistry              │
//! │  ┌───────────────────────────────────┐  │
//! │  │ S1 → T1 (parent: root)  domains   │  │
//! │  │ S2 → T2 (parent: root)  domains   │  │
//! │  │ S3 → T3 (parent: S2)    domains   │  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Detaching a session also releases every session attached through it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::domains::{DomainGraph, DomainResolver};
use crate::error::Result;
use crate::identifiers::{SessionId, TargetId};
use crate::protocol::{Command, EventPattern, TypedEvent};

use super::correlator::PendingKind;
use super::{CommandChannel, Connection, EventStream, SessionScope, Subscription};

// ============================================================================
// SessionInfo
// ============================================================================

/// An attached session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session identifier allocated by the remote end.
    pub session_id: SessionId,
    /// Target the session is attached to.
    pub target_id: TargetId,
    /// Session the attach happened through (`None` for root).
    pub parent_session_id: Option<SessionId>,
}

// ============================================================================
// SessionRegistry
// ============================================================================

struct SessionEntry {
    info: SessionInfo,
    domains: Arc<DomainResolver>,
}

/// Attached sessions of one connection.
pub(crate) struct SessionRegistry {
    /// Shared dependency declarations for new resolvers.
    graph: Arc<RwLock<DomainGraph>>,
    /// Attached sessions by id.
    sessions: RwLock<FxHashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(graph: Arc<RwLock<DomainGraph>>) -> Self {
        Self {
            graph,
            sessions: RwLock::new(FxHashMap::default()),
        }
    }

    /// Registers a session. An already known session is left untouched.
    ///
    /// Returns `true` if the session is new.
    pub fn insert(&self, info: SessionInfo) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&info.session_id) {
            return false;
        }

        debug!(
            session_id = %info.session_id,
            target_id = %info.target_id,
            parent = ?info.parent_session_id,
            "Session attached"
        );
        let domains = Arc::new(DomainResolver::new(Arc::clone(&self.graph)));
        sessions.insert(info.session_id.clone(), SessionEntry { info, domains });
        true
    }

    #[inline]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn get(&self, session_id: &SessionId) -> Option<(SessionInfo, Arc<DomainResolver>)> {
        self.sessions
            .read()
            .get(session_id)
            .map(|entry| (entry.info.clone(), Arc::clone(&entry.domains)))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Removes a session and every session attached through it.
    ///
    /// Returns the removed sessions, the requested one first. Empty if the
    /// session was unknown.
    pub fn remove_tree(&self, session_id: &SessionId) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.write();
        let mut removed = Vec::new();
        let mut frontier = vec![session_id.clone()];

        while let Some(current) = frontier.pop() {
            let Some(entry) = sessions.remove(&current) else {
                continue;
            };
            frontier.extend(
                sessions
                    .values()
                    .filter(|child| child.info.parent_session_id.as_ref() == Some(&current))
                    .map(|child| child.info.session_id.clone()),
            );
            removed.push(entry.info);
        }

        removed
    }

    /// Removes every session.
    pub fn clear(&self) -> usize {
        let mut sessions = self.sessions.write();
        let count = sessions.len();
        sessions.clear();
        count
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

// ============================================================================
// SessionHandle
// ============================================================================

/// A view of one attached session.
///
/// Commands sent through the handle carry its session id, subscriptions
/// only see its events, and domains are enabled per session. Cloning is
/// cheap.
#[derive(Clone)]
pub struct SessionHandle {
    connection: Connection,
    info: SessionInfo,
    domains: Arc<DomainResolver>,
}

impl SessionHandle {
    pub(crate) fn new(connection: Connection, info: SessionInfo, domains: Arc<DomainResolver>) -> Self {
        Self {
            connection,
            info,
            domains,
        }
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.info.session_id
    }

    /// Returns the attached target.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.info.target_id
    }

    /// Returns the session this one was attached through.
    #[inline]
    #[must_use]
    pub fn parent_session_id(&self) -> Option<&SessionId> {
        self.info.parent_session_id.as_ref()
    }

    /// Returns the full session description.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Returns the owning connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns `true` while the session is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.connection.shared().sessions.contains(&self.info.session_id)
    }

    /// Sends a raw command on this session.
    ///
    /// # Errors
    ///
    /// See [`Connection::call_raw`]; additionally
    /// [`crate::Error::SessionDetached`] once the session is gone.
    pub async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.connection
            .execute(Some(&self.info.session_id), method, params, PendingKind::Plain)
            .await
    }

    /// Sends a command with serializable params and decodes the result.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.connection
            .call_on(Some(&self.info.session_id), method, params)
            .await
    }

    /// Sends a typed command on this session.
    pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.connection
            .send_on(Some(&self.info.session_id), command)
            .await
    }

    /// Subscribes to this session's events matching `pattern`.
    pub fn subscribe(&self, pattern: impl Into<EventPattern>) -> Subscription {
        self.connection.subscribe_scoped(
            pattern.into(),
            SessionScope::Session(self.info.session_id.clone()),
        )
    }

    /// Subscribes to one typed event of this session.
    pub fn events<E: TypedEvent>(&self) -> EventStream<E> {
        self.subscribe(EventPattern::parse(E::METHOD)).typed()
    }

    /// Enables `domain` and its dependencies on this session.
    ///
    /// # Errors
    ///
    /// See [`DomainResolver::ensure_enabled`].
    pub async fn ensure_enabled(&self, domain: &str) -> Result<()> {
        self.domains.ensure_enabled(self, domain).await
    }

    /// Returns `true` if `domain` is enabled on this session.
    #[must_use]
    pub fn is_enabled(&self, domain: &str) -> bool {
        self.domains.is_enabled(domain)
    }

    /// Returns the domains enabled on this session.
    #[must_use]
    pub fn enabled_domains(&self) -> Vec<String> {
        self.domains.enabled_domains()
    }

    /// Detaches the session.
    ///
    /// # Errors
    ///
    /// See [`Connection::detach`].
    pub async fn detach(&self) -> Result<()> {
        self.connection.detach(&self.info.session_id).await
    }

    /// Attaches to a target through this session.
    ///
    /// The new session reports this one as its parent.
    pub async fn attach(&self, target_id: &TargetId) -> Result<SessionHandle> {
        self.connection
            .attach_on(Some(&self.info.session_id), target_id)
            .await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.info.session_id)
            .field("target_id", &self.info.target_id)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl CommandChannel for SessionHandle {
    async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        SessionHandle::call_raw(self, method, params).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::error::Error;
    use crate::transport::mock::connect_pair;
    use crate::transport::ConnectionOptions;

    fn info(session: &str, target: &str, parent: Option<&str>) -> SessionInfo {
        SessionInfo {
            session_id: SessionId::from(session),
            target_id: TargetId::from(target),
            parent_session_id: parent.map(SessionId::from),
        }
    }

    #[test]
    fn test_registry_insert_keeps_first() {
        let registry = SessionRegistry::new(Arc::new(RwLock::new(DomainGraph::new())));
        assert!(registry.insert(info("S1", "T1", None)));
        assert!(!registry.insert(info("S1", "T9", Some("S0"))));

        let (kept, _) = registry.get(&SessionId::from("S1")).expect("session");
        assert_eq!(kept.target_id, TargetId::from("T1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_remove_tree_cascades() {
        let registry = SessionRegistry::new(Arc::new(RwLock::new(DomainGraph::new())));
        registry.insert(info("S1", "T1", None));
        registry.insert(info("S2", "T2", Some("S1")));
        registry.insert(info("S3", "T3", Some("S2")));
        registry.insert(info("S4", "T4", None));

        let removed: Vec<_> = registry
            .remove_tree(&SessionId::from("S1"))
            .into_iter()
            .map(|i| i.session_id.to_string())
            .collect();

        assert_eq!(removed, ["S1", "S2", "S3"]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&SessionId::from("S4")));
        assert!(registry.remove_tree(&SessionId::from("S1")).is_empty());
    }

    /// Attaches to `target` and answers with `session`.
    async fn attach(
        connection: &Connection,
        peer: &mut crate::transport::mock::MockPeer,
        target: &str,
        session: &str,
    ) -> SessionHandle {
        let target_id = TargetId::from(target);
        let attaching = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.attach(&target_id).await })
        };

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.attachToTarget");
        assert_eq!(frame["params"], json!({"targetId": target, "flatten": true}));
        peer.reply(&frame, json!({"sessionId": session}));

        attaching.await.expect("join").expect("attach")
    }

    #[tokio::test]
    async fn test_attach_registers_session_before_returning() {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let session = attach(&connection, &mut peer, "T1", "S1").await;

        assert_eq!(session.session_id().as_str(), "S1");
        assert_eq!(session.target_id().as_str(), "T1");
        assert!(session.is_attached());
        assert_eq!(connection.sessions().len(), 1);

        let calling = {
            let session = session.clone();
            tokio::spawn(async move { session.call_raw("Runtime.evaluate", Some(json!({"expression": "1"}))).await })
        };
        let frame = peer.recv().await;
        assert_eq!(frame["sessionId"], "S1");
        peer.reply(&frame, json!({"result": {"type": "number", "value": 1}}));

        let value = calling.await.expect("join").expect("call");
        assert_eq!(value["result"]["value"], 1);
    }

    #[tokio::test]
    async fn test_session_event_isolation() {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let s1 = attach(&connection, &mut peer, "T1", "S1").await;
        let s2 = attach(&connection, &mut peer, "T2", "S2").await;

        let mut sub1 = s1.subscribe("Page.*");
        let mut sub2 = s2.subscribe("Page.*");
        let mut root = connection.subscribe("Page.*");

        peer.event(Some("S1"), "Page.loadEventFired", json!({"timestamp": 1.0}));
        peer.event(Some("S2"), "Page.loadEventFired", json!({"timestamp": 2.0}));
        peer.event(None, "Page.loadEventFired", json!({"timestamp": 3.0}));

        let e1 = sub1.recv().await.expect("s1 event");
        let e2 = sub2.recv().await.expect("s2 event");
        let e3 = root.recv().await.expect("root event");
        assert_eq!(e1.params["timestamp"], 1.0);
        assert_eq!(e2.params["timestamp"], 2.0);
        assert_eq!(e3.params["timestamp"], 3.0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tokio::time::timeout(Duration::from_millis(50), sub1.recv()).await.is_err());
        assert!(tokio::time::timeout(Duration::from_millis(50), sub2.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_detach_fails_pending_and_later_calls() {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let session = attach(&connection, &mut peer, "T1", "S1").await;
        let mut scoped = session.subscribe("*");

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.call_raw("Page.reload", None).await })
        };
        let reload = peer.recv().await;
        assert_eq!(reload["method"], "Page.reload");

        let detaching = {
            let session = session.clone();
            tokio::spawn(async move { session.detach().await })
        };

        let err = pending.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::SessionDetached { ref session_id } if session_id.as_str() == "S1"));
        assert!(scoped.recv().await.is_none());

        let detach = peer.recv().await;
        assert_eq!(detach["method"], "Target.detachFromTarget");
        assert_eq!(detach["params"]["sessionId"], "S1");
        peer.reply(&detach, json!({}));
        detaching.await.expect("join").expect("detach");

        // A late reply to the failed command is dropped.
        peer.reply(&reload, json!({}));

        let err = session.call_raw("Page.reload", None).await.unwrap_err();
        assert!(matches!(err, Error::SessionDetached { .. }));
        assert!(!session.is_attached());
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_frames_for_unknown_session_are_dropped() {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let mut all = connection.subscribe_scoped(EventPattern::All, SessionScope::Any);

        peer.event(Some("ghost"), "Page.loadEventFired", json!({}));
        peer.event(None, "Inspector.detached", json!({"reason": "test"}));

        let event = all.recv().await.expect("event");
        assert_eq!(event.method, "Inspector.detached");
        assert!(connection.session(&SessionId::from("ghost")).is_err());
    }

    #[tokio::test]
    async fn test_auto_attached_child_sessions() {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let parent = attach(&connection, &mut peer, "T1", "S1").await;
        let mut child_events = connection.subscribe_scoped(
            EventPattern::parse("Runtime.*"),
            SessionScope::Session(SessionId::from("S2")),
        );

        peer.event(
            Some("S1"),
            "Target.attachedToTarget",
            json!({
                "sessionId": "S2",
                "targetInfo": {"targetId": "W1", "type": "worker"},
                "waitingForDebugger": false
            }),
        );
        peer.event(Some("S2"), "Runtime.executionContextCreated", json!({"context": {"id": 1}}));

        let event = child_events.recv().await.expect("child event");
        assert_eq!(event.session_id, Some(SessionId::from("S2")));

        let child = connection.session(&SessionId::from("S2")).expect("child");
        assert_eq!(child.parent_session_id(), Some(parent.session_id()));
        assert_eq!(child.target_id().as_str(), "W1");

        peer.event(
            None,
            "Target.detachedFromTarget",
            json!({"sessionId": "S1", "targetId": "T1"}),
        );
        assert!(child_events.recv().await.is_none());
        assert!(!parent.is_attached());
        assert!(!child.is_attached());
        assert!(connection.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_domains_are_enabled_per_session() {
        let mut graph = DomainGraph::new();
        graph.declare("Page", ["Runtime"]);
        let (connection, mut peer) =
            connect_pair(ConnectionOptions::default().with_domain_graph(graph)).await;
        let s1 = attach(&connection, &mut peer, "T1", "S1").await;
        let s2 = attach(&connection, &mut peer, "T2", "S2").await;

        let enabling = {
            let s1 = s1.clone();
            tokio::spawn(async move { s1.ensure_enabled("Page").await })
        };
        for expected in ["Runtime.enable", "Page.enable"] {
            let frame = peer.recv().await;
            assert_eq!(frame["method"], expected);
            assert_eq!(frame["sessionId"], "S1");
            assert!(frame.get("params").is_none());
            peer.reply(&frame, json!({}));
        }
        enabling.await.expect("join").expect("enable");

        assert_eq!(s1.enabled_domains(), ["Page", "Runtime"]);
        assert!(s2.enabled_domains().is_empty());
        assert!(!connection.is_enabled("Runtime"));
    }
}
