//! Target tracking and lifecycle.
//!
//! The [`TargetManager`] keeps a live table of page targets from the
//! `Target` domain's discovery events and wraps the create / attach / close
//! sequences.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifiers::TargetId;
use crate::protocol::target::{
    CloseTarget, CreateBrowserContext, CreateTarget, DisposeBrowserContext, GetTargetInfo,
    SetDiscoverTargets, TargetCrashed, TargetCreated, TargetDestroyed, TargetInfo,
    TargetInfoChanged,
};
use crate::protocol::{EventPattern, TypedEvent};
use crate::transport::{Connection, SessionHandle, Subscription};

// ============================================================================
// Types
// ============================================================================

/// Known targets by id.
type TargetTable = Arc<RwLock<FxHashMap<TargetId, TargetInfo>>>;

/// Parameters of a new target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTarget {
    /// Initial URL.
    pub url: String,
    /// Create the target in a fresh browser context.
    pub incognito: bool,
    /// Viewport width in pixels.
    pub width: Option<u32>,
    /// Viewport height in pixels.
    pub height: Option<u32>,
}

impl NewTarget {
    /// A target opening `url` in the default context.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            incognito: false,
            width: None,
            height: None,
        }
    }

    /// Opens the target in a fresh browser context.
    #[must_use]
    pub fn incognito(mut self, incognito: bool) -> Self {
        self.incognito = incognito;
        self
    }

    /// Sets the viewport size.
    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

// ============================================================================
// TargetManager
// ============================================================================

/// Tracks page targets and manages their lifecycle.
pub struct TargetManager {
    connection: Connection,
    targets: TargetTable,
    tracker: JoinHandle<()>,
}

impl TargetManager {
    /// Starts tracking targets on `connection`.
    ///
    /// Subscribes to the `Target` domain first, then turns discovery on,
    /// so no lifecycle event is missed.
    ///
    /// # Errors
    ///
    /// Returns the error of `Target.setDiscoverTargets`.
    pub async fn start(connection: Connection) -> Result<Self> {
        let targets = TargetTable::default();
        let subscription = connection.subscribe(EventPattern::domain("Target"));
        let tracker = tokio::spawn(track_targets(subscription, Arc::clone(&targets)));

        let manager = Self {
            connection,
            targets,
            tracker,
        };
        manager
            .connection
            .send(&SetDiscoverTargets { discover: true })
            .await?;

        debug!("Target discovery enabled");
        Ok(manager)
    }

    /// Returns the known page targets.
    #[must_use]
    pub fn list(&self) -> Vec<TargetInfo> {
        self.targets.read().values().cloned().collect()
    }

    /// Returns one known target.
    #[must_use]
    pub fn get(&self, target_id: &TargetId) -> Option<TargetInfo> {
        self.targets.read().get(target_id).cloned()
    }

    /// Creates a background target, reads its description and attaches
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing `Target` command.
    pub async fn create(&self, target: &NewTarget) -> Result<SessionHandle> {
        let browser_context_id = if target.incognito {
            let context = self
                .connection
                .send(&CreateBrowserContext {
                    dispose_on_detach: Some(true),
                })
                .await?;
            Some(context.browser_context_id)
        } else {
            None
        };

        let created = self
            .connection
            .send(&CreateTarget {
                url: target.url.clone(),
                width: target.width,
                height: target.height,
                browser_context_id,
                background: Some(true),
            })
            .await?;

        let info = self
            .connection
            .send(&GetTargetInfo {
                target_id: created.target_id,
            })
            .await?
            .target_info;

        info!(
            target_id = %info.target_id,
            url = %info.url,
            incognito = target.incognito,
            "Target created"
        );
        if info.is_page() {
            self.targets.write().insert(info.target_id.clone(), info.clone());
        }
        self.attach(&info.target_id).await
    }

    /// Attaches to an existing target.
    ///
    /// # Errors
    ///
    /// See [`Connection::attach`].
    pub async fn attach(&self, target_id: &TargetId) -> Result<SessionHandle> {
        self.connection.attach(target_id).await
    }

    /// Closes the target of `session`, disposes its browser context if it
    /// has one, and forgets the session.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing `Target` command.
    pub async fn close(&self, session: &SessionHandle) -> Result<()> {
        let target_id = session.target_id().clone();
        let info = self
            .connection
            .send(&GetTargetInfo {
                target_id: target_id.clone(),
            })
            .await?
            .target_info;

        self.connection
            .send(&CloseTarget {
                target_id: target_id.clone(),
            })
            .await?;

        if let Some(browser_context_id) = info.browser_context_id {
            self.connection
                .send(&DisposeBrowserContext { browser_context_id })
                .await?;
        }

        self.connection.release(session.session_id());
        self.targets.write().remove(&target_id);
        info!(target_id = %target_id, "Target closed");
        Ok(())
    }
}

impl Drop for TargetManager {
    fn drop(&mut self) {
        self.tracker.abort();
    }
}

impl std::fmt::Debug for TargetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetManager")
            .field("targets", &self.targets.read().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Applies `Target` lifecycle events to the table until the stream ends.
async fn track_targets(mut events: Subscription, targets: TargetTable) {
    while let Some(event) = events.recv().await {
        let method = event.method.as_str();

        if method == TargetCreated::METHOD || method == TargetInfoChanged::METHOD {
            let info = if method == TargetCreated::METHOD {
                event.decode::<TargetCreated>().map(|e| e.target_info)
            } else {
                event.decode::<TargetInfoChanged>().map(|e| e.target_info)
            };
            match info {
                Ok(info) if info.is_page() => {
                    debug!(target_id = %info.target_id, url = %info.url, "Target updated");
                    targets.write().insert(info.target_id.clone(), info);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Malformed target event"),
            }
        } else if method == TargetDestroyed::METHOD {
            match event.decode::<TargetDestroyed>() {
                Ok(destroyed) => {
                    targets.write().remove(&destroyed.target_id);
                    debug!(target_id = %destroyed.target_id, "Target destroyed");
                }
                Err(e) => warn!(error = %e, "Malformed target event"),
            }
        } else if method == TargetCrashed::METHOD {
            match event.decode::<TargetCrashed>() {
                Ok(crashed) => {
                    targets.write().remove(&crashed.target_id);
                    warn!(target_id = %crashed.target_id, status = %crashed.status, "Target crashed");
                }
                Err(e) => warn!(error = %e, "Malformed target event"),
            }
        }
    }

    debug!("Target tracking stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::{Value, json};

    use crate::identifiers::BrowserContextId;
    use crate::transport::ConnectionOptions;
    use crate::transport::mock::{MockPeer, connect_pair};

    async fn started() -> (Connection, MockPeer, tokio::task::JoinHandle<Result<TargetManager>>) {
        let (connection, mut peer) = connect_pair(ConnectionOptions::default()).await;
        let starting = tokio::spawn(TargetManager::start(connection.clone()));

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.setDiscoverTargets");
        assert_eq!(frame["params"], json!({"discover": true}));
        peer.reply(&frame, json!({}));

        (connection, peer, starting)
    }

    fn page(target_id: &str, url: &str) -> Value {
        json!({"targetId": target_id, "type": "page", "title": "", "url": url, "attached": false})
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_tracks_page_targets() {
        let (_connection, peer, starting) = started().await;
        let manager = starting.await.expect("join").expect("start");

        peer.event(None, "Target.targetCreated", json!({"targetInfo": page("P1", "about:blank")}));
        peer.event(
            None,
            "Target.targetCreated",
            json!({"targetInfo": {"targetId": "W1", "type": "service_worker"}}),
        );
        peer.event(None, "Target.targetCreated", json!({"targetInfo": page("P2", "about:blank")}));
        eventually(|| manager.list().len() == 2).await;

        peer.event(
            None,
            "Target.targetInfoChanged",
            json!({"targetInfo": page("P1", "https://example.com/")}),
        );
        eventually(|| manager.get(&TargetId::from("P1")).is_some_and(|t| t.url == "https://example.com/")).await;

        peer.event(None, "Target.targetDestroyed", json!({"targetId": "P1"}));
        peer.event(
            None,
            "Target.targetCrashed",
            json!({"targetId": "P2", "status": "crashed", "errorCode": 139}),
        );
        eventually(|| manager.list().is_empty()).await;
    }

    #[tokio::test]
    async fn test_create_incognito_then_close() {
        let (connection, mut peer, starting) = started().await;
        let manager = Arc::new(starting.await.expect("join").expect("start"));

        let creating = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .create(&NewTarget::new("about:blank").incognito(true).viewport(800, 600))
                    .await
            })
        };

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.createBrowserContext");
        assert_eq!(frame["params"], json!({"disposeOnDetach": true}));
        peer.reply(&frame, json!({"browserContextId": "C1"}));

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.createTarget");
        assert_eq!(
            frame["params"],
            json!({
                "url": "about:blank",
                "width": 800,
                "height": 600,
                "browserContextId": "C1",
                "background": true
            })
        );
        peer.reply(&frame, json!({"targetId": "P1"}));

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.getTargetInfo");
        assert_eq!(frame["params"], json!({"targetId": "P1"}));
        peer.reply(
            &frame,
            json!({"targetInfo": {"targetId": "P1", "type": "page", "url": "about:blank", "browserContextId": "C1"}}),
        );

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.attachToTarget");
        peer.reply(&frame, json!({"sessionId": "S1"}));

        let session = creating.await.expect("join").expect("create");
        assert_eq!(session.target_id().as_str(), "P1");
        assert!(session.is_attached());
        let tracked = manager.get(&TargetId::from("P1")).expect("tracked");
        assert_eq!(tracked.browser_context_id, Some(BrowserContextId::from("C1")));

        let closing = {
            let manager = Arc::clone(&manager);
            let session = session.clone();
            tokio::spawn(async move { manager.close(&session).await })
        };

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.getTargetInfo");
        peer.reply(
            &frame,
            json!({"targetInfo": {"targetId": "P1", "type": "page", "browserContextId": "C1"}}),
        );

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.closeTarget");
        assert_eq!(frame["params"]["targetId"], "P1");
        peer.reply(&frame, json!({"success": true}));

        let frame = peer.recv().await;
        assert_eq!(frame["method"], "Target.disposeBrowserContext");
        assert_eq!(frame["params"]["browserContextId"], "C1");
        peer.reply(&frame, json!({}));

        closing.await.expect("join").expect("close");
        assert!(!session.is_attached());
        assert!(connection.sessions().is_empty());
    }
}
