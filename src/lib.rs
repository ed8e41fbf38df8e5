//! CDP Runtime - Chrome DevTools Protocol client runtime.
//!
//! This library provides the runtime underneath generated DevTools
//! protocol bindings: one WebSocket connection carrying commands, replies
//! and events for the browser and every attached target.
//!
//! # Architecture
//!
//! The runtime follows a client-server model:
//!
//! - **Local End (Rust)**: Sends commands, receives replies and events
//! - **Remote End (Browser)**: Executes commands, emits events
//!
//! Key design principles:
//!
//! - One [`Connection`] owns one WebSocket and one reader/writer task
//! - Commands are correlated by numeric id, replies may arrive in any order
//! - Targets are attached in flat mode: every frame carries its `sessionId`
//! - Events fan out to every matching [`Subscription`]
//! - Domains are enabled on demand, dependencies first
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_runtime::{Connection, Result, TargetId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::connect("ws://127.0.0.1:9222/devtools/browser/3f1c").await?;
//!
//!     let version = connection.call_raw("Browser.getVersion", None).await?;
//!     println!("Browser: {}", version["product"]);
//!
//!     let page = connection.attach(&TargetId::from("8A1F")).await?;
//!     page.ensure_enabled("Page").await?;
//!
//!     let mut loads = page.subscribe("Page.loadEventFired");
//!     page.call_raw("Page.reload", None).await?;
//!     loads.recv().await;
//!
//!     connection.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Endpoint discovery and target management |
//! | [`domains`] | Domain dependency graph and resolver |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire frames and binding traits |
//! | [`transport`] | Connection, correlation, sessions and events |

// ============================================================================
// Modules
// ============================================================================

/// Endpoint discovery and target management.
///
/// Use [`Browser::builder()`] to connect to a running browser.
pub mod browser;

/// Domain dependency resolution.
pub mod domains;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire frames and binding traits.
///
/// Generated domain bindings implement [`Command`] and [`TypedEvent`].
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection, correlation, session multiplexing and event fan-out.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{Browser, BrowserBuilder, BrowserOptions, NewTarget, TargetManager, VersionInfo};

// Domain types
pub use domains::{DomainGraph, DomainResolver};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{BrowserContextId, CommandId, SessionId, SubscriptionId, TargetId};

// Protocol types
pub use protocol::{Command, Empty, Event, EventPattern, NoParams, TypedEvent};

// Transport types
pub use transport::{
    CommandChannel, Connection, ConnectionBuilder, ConnectionOptions, EventStream, SessionHandle,
    SessionInfo, SessionScope, Subscription,
};
