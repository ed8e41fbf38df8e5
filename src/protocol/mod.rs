//! DevTools protocol message types.
//!
//! This module defines the JSON frame format exchanged with the remote
//! debugging endpoint and the traits generated domain bindings implement.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`CommandRequest`] | Local → Remote | Command with numeric `id` |
//! | [`Response`] | Remote → Local | `result` or `error` for one `id` |
//! | [`Event`] | Remote → Local | Notification without `id` |
//!
//! Every frame may carry a `sessionId` (flat mode). Frames without one
//! belong to the root (browser-level) session.
//!
//! # Method Naming
//!
//! Methods follow `Domain.method` format:
//!
//! - `Page.navigate`
//! - `Target.attachToTarget`
//! - `Network.requestWillBeSent` (event)
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | [`Command`] / [`TypedEvent`] binding traits |
//! | `event` | [`Event`] and [`EventPattern`] |
//! | `request` | [`CommandRequest`], [`InboundFrame`], [`Response`] |
//! | `target` | `Target` domain bindings used by the runtime |

// ============================================================================
// Submodules
// ============================================================================

/// Binding traits for generated domain code.
pub mod command;

/// Event message types and subscription patterns.
pub mod event;

/// Request and response frame types.
pub mod request;

/// `Target` domain commands and events.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, Empty, NoParams, TypedEvent, encode_params};
pub use event::{Event, EventPattern};
pub use request::{CommandRequest, InboundFrame, Response, ResponseError};
