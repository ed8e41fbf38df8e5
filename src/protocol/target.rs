//! `Target` domain bindings used by the runtime itself.
//!
//! Session multiplexing and target management need a handful of `Target`
//! commands and events. They are written the same way generated bindings
//! are: a params struct implementing [`Command`] and payload structs
//! implementing [`TypedEvent`].

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{BrowserContextId, SessionId, TargetId};

use super::{Command, Empty, TypedEvent};

// ============================================================================
// Types
// ============================================================================

/// Description of a debuggable target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target identifier.
    pub target_id: TargetId,
    /// Target type (`page`, `iframe`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Whether a client is attached.
    #[serde(default)]
    pub attached: bool,
    /// Opener target, if any.
    #[serde(default)]
    pub opener_id: Option<TargetId>,
    /// Browser context the target lives in.
    #[serde(default)]
    pub browser_context_id: Option<BrowserContextId>,
}

impl TargetInfo {
    /// Returns `true` for page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

// ============================================================================
// Commands
// ============================================================================

/// `Target.attachToTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
    /// Target to attach to.
    pub target_id: TargetId,
    /// Use flat mode (session id on every frame).
    pub flatten: bool,
}

/// Reply of `Target.attachToTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResponse {
    /// Newly created session.
    pub session_id: SessionId,
}

impl Command for AttachToTarget {
    const METHOD: &'static str = "Target.attachToTarget";
    type Response = AttachToTargetResponse;
}

/// `Target.detachFromTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTarget {
    /// Session to detach.
    pub session_id: SessionId,
}

impl Command for DetachFromTarget {
    const METHOD: &'static str = "Target.detachFromTarget";
    type Response = Empty;
}

/// `Target.setDiscoverTargets`.
#[derive(Debug, Clone, Serialize)]
pub struct SetDiscoverTargets {
    /// Whether to emit target lifecycle events.
    pub discover: bool,
}

impl Command for SetDiscoverTargets {
    const METHOD: &'static str = "Target.setDiscoverTargets";
    type Response = Empty;
}

/// `Target.createTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTarget {
    /// Initial URL.
    pub url: String,
    /// Viewport width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Viewport height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Browser context to create the target in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<BrowserContextId>,
    /// Create the target in background.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
}

/// Reply of `Target.createTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResponse {
    /// Created target.
    pub target_id: TargetId,
}

impl Command for CreateTarget {
    const METHOD: &'static str = "Target.createTarget";
    type Response = CreateTargetResponse;
}

/// `Target.closeTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTarget {
    /// Target to close.
    pub target_id: TargetId,
}

impl Command for CloseTarget {
    const METHOD: &'static str = "Target.closeTarget";
    type Response = Empty;
}

/// `Target.createBrowserContext`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContext {
    /// Dispose the context when the debugging session disconnects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispose_on_detach: Option<bool>,
}

/// Reply of `Target.createBrowserContext`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContextResponse {
    /// Created context.
    pub browser_context_id: BrowserContextId,
}

impl Command for CreateBrowserContext {
    const METHOD: &'static str = "Target.createBrowserContext";
    type Response = CreateBrowserContextResponse;
}

/// `Target.disposeBrowserContext`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeBrowserContext {
    /// Context to dispose.
    pub browser_context_id: BrowserContextId,
}

impl Command for DisposeBrowserContext {
    const METHOD: &'static str = "Target.disposeBrowserContext";
    type Response = Empty;
}

/// `Target.getTargetInfo`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfo {
    /// Target to describe.
    pub target_id: TargetId,
}

/// Reply of `Target.getTargetInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfoResponse {
    /// Target description.
    pub target_info: TargetInfo,
}

impl Command for GetTargetInfo {
    const METHOD: &'static str = "Target.getTargetInfo";
    type Response = GetTargetInfoResponse;
}

// ============================================================================
// Events
// ============================================================================

/// `Target.targetCreated`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreated {
    /// Created target.
    pub target_info: TargetInfo,
}

impl TypedEvent for TargetCreated {
    const METHOD: &'static str = "Target.targetCreated";
}

/// `Target.targetInfoChanged`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfoChanged {
    /// Updated target.
    pub target_info: TargetInfo,
}

impl TypedEvent for TargetInfoChanged {
    const METHOD: &'static str = "Target.targetInfoChanged";
}

/// `Target.targetDestroyed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDestroyed {
    /// Destroyed target.
    pub target_id: TargetId,
}

impl TypedEvent for TargetDestroyed {
    const METHOD: &'static str = "Target.targetDestroyed";
}

/// `Target.targetCrashed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCrashed {
    /// Crashed target.
    pub target_id: TargetId,
    /// Termination status.
    #[serde(default)]
    pub status: String,
    /// Termination error code.
    #[serde(default)]
    pub error_code: i64,
}

impl TypedEvent for TargetCrashed {
    const METHOD: &'static str = "Target.targetCrashed";
}

/// `Target.attachedToTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedToTarget {
    /// New session.
    pub session_id: SessionId,
    /// Target the session is attached to.
    pub target_info: TargetInfo,
    /// Whether the target is paused waiting for the debugger.
    #[serde(default)]
    pub waiting_for_debugger: bool,
}

impl TypedEvent for AttachedToTarget {
    const METHOD: &'static str = "Target.attachedToTarget";
}

/// `Target.detachedFromTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
    /// Detached session.
    pub session_id: SessionId,
    /// Target the session was attached to.
    #[serde(default)]
    pub target_id: Option<TargetId>,
}

impl TypedEvent for DetachedFromTarget {
    const METHOD: &'static str = "Target.detachedFromTarget";
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::encode_params;

    #[test]
    fn test_attach_params() {
        let params = encode_params(&AttachToTarget {
            target_id: TargetId::from("T1"),
            flatten: true,
        })
        .expect("encode");
        assert_eq!(params, Some(json!({"targetId": "T1", "flatten": true})));
    }

    #[test]
    fn test_create_target_skips_unset_fields() {
        let params = encode_params(&CreateTarget {
            url: "about:blank".into(),
            width: Some(1024),
            height: None,
            browser_context_id: None,
            background: Some(true),
        })
        .expect("encode");
        assert_eq!(
            params,
            Some(json!({"url": "about:blank", "width": 1024, "background": true}))
        );
    }

    #[test]
    fn test_target_info_decode() {
        let info: TargetInfo = serde_json::from_value(json!({
            "targetId": "T1",
            "type": "page",
            "title": "Example",
            "url": "https://example.com",
            "attached": false,
            "browserContextId": "C1"
        }))
        .expect("decode");

        assert!(info.is_page());
        assert_eq!(info.browser_context_id, Some(BrowserContextId::from("C1")));
        assert_eq!(info.opener_id, None);
    }

    #[test]
    fn test_attached_to_target_decode() {
        let event: AttachedToTarget = serde_json::from_value(json!({
            "sessionId": "S9",
            "targetInfo": {"targetId": "T9", "type": "iframe"},
            "waitingForDebugger": true
        }))
        .expect("decode");

        assert_eq!(event.session_id.as_str(), "S9");
        assert_eq!(event.target_info.target_id.as_str(), "T9");
        assert!(!event.target_info.is_page());
        assert!(event.waiting_for_debugger);
    }
}
