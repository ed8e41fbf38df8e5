//! Browser-level conveniences.
//!
//! This module sits on top of the transport: it finds the WebSocket URL of
//! a running browser and manages page targets.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Browser`] | Discovered endpoint + connection + target tracking |
//! | [`TargetManager`] | Live table of page targets, create/attach/close |
//! | [`VersionInfo`] | Reply of `GET /json/version` |
//!
//! # Example
//!
//! ```no_run
//! use cdp_runtime::{Browser, Result};
//!
//! # async fn example() -> Result<()> {
//! let browser = Browser::connect("127.0.0.1:9222").await?;
//! let page = browser.new_target().await?;
//!
//! page.ensure_enabled("Page").await?;
//! page.call_raw("Page.navigate", Some(serde_json::json!({"url": "https://example.com"})))
//!     .await?;
//!
//! browser.close_target(&page).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Browser connection builder and settings.
pub mod builder;

/// Browser façade.
pub mod core;

/// `/json/version` discovery.
pub mod discovery;

/// Target tracking and lifecycle.
pub mod targets;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{BrowserBuilder, BrowserOptions};
pub use core::Browser;
pub use discovery::{VersionInfo, fetch_version};
pub use targets::{NewTarget, TargetManager};
