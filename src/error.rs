//! Error types for the DevTools runtime.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_runtime::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     connection.ensure_enabled("Page").await?;
//!     connection.call_raw("Page.reload", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Scope |
//! |----------|----------|-------|
//! | Configuration | [`Error::Config`], [`Error::Discovery`] | caller |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] | whole connection |
//! | Correlation | [`Error::Protocol`], [`Error::Decode`], [`Error::RequestTimeout`], [`Error::TooManyPending`], [`Error::IdSpaceExhausted`], [`Error::InvalidFrame`] | one call |
//! | Sessions | [`Error::SessionDetached`], [`Error::UnknownSession`] | one session |
//! | Dependencies | [`Error::DependencyCycle`] | one `ensure_enabled` call |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] | varies |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{CommandId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection or browser options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint discovery failed.
    ///
    /// Returned when `/json/version` cannot be queried or is malformed.
    #[error("Discovery failed: {message}")]
    Discovery {
        /// Description of the discovery failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established or a frame
    /// cannot be written.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout during the WebSocket handshake.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed.
    ///
    /// Delivered to every pending command when the transport closes or
    /// fails. Fatal to the whole connection.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// The remote end answered a command with an `error` object.
    ///
    /// Local to that one call.
    #[error("Protocol error {code} in {method}: {message}")]
    Protocol {
        /// Method of the failed command.
        method: String,
        /// Error code from the remote end.
        code: i64,
        /// Error message from the remote end.
        message: String,
        /// Optional additional data from the remote end.
        data: Option<String>,
    },

    /// A result or event payload did not match the requested shape.
    ///
    /// Carries the raw payload for diagnostics.
    #[error("Failed to decode {method}: {source}")]
    Decode {
        /// Command or event method whose payload failed to decode.
        method: String,
        /// The raw payload.
        payload: Value,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Command timed out waiting for its reply.
    #[error("Command {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The command ID that timed out.
        request_id: CommandId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Too many commands in flight on one connection.
    #[error("Too many pending commands: {pending}/{max}")]
    TooManyPending {
        /// Commands currently in flight.
        pending: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The command ID counter reached the end of its numeric range.
    #[error("Command ID space exhausted")]
    IdSpaceExhausted,

    /// An inbound frame could not be classified.
    #[error("Invalid frame: {message}")]
    InvalidFrame {
        /// Description of what was wrong with the frame.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session a command was pending on was detached.
    #[error("Session detached: {session_id}")]
    SessionDetached {
        /// The detached session.
        session_id: SessionId,
    },

    /// The session is not attached on this connection.
    #[error("Unknown session: {session_id}")]
    UnknownSession {
        /// The unknown session.
        session_id: SessionId,
    },

    // ========================================================================
    // Dependency Errors
    // ========================================================================
    /// The declared domain dependency graph contains a cycle.
    #[error("Domain dependency cycle: {}", path.join(" -> "))]
    DependencyCycle {
        /// Domains on the cycle, first and last entry equal.
        path: Vec<String>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error during discovery.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error for a failed command.
    #[inline]
    pub fn protocol(
        method: impl Into<String>,
        code: i64,
        message: impl Into<String>,
        data: Option<String>,
    ) -> Self {
        Self::Protocol {
            method: method.into(),
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a decode error keeping the raw payload.
    #[inline]
    pub fn decode(method: impl Into<String>, payload: Value, source: serde_json::Error) -> Self {
        Self::Decode {
            method: method.into(),
            payload,
            source,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: CommandId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates an invalid frame error.
    #[inline]
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Creates a session detached error.
    #[inline]
    pub fn session_detached(session_id: SessionId) -> Self {
        Self::SessionDetached { session_id }
    }

    /// Creates an unknown session error.
    #[inline]
    pub fn unknown_session(session_id: SessionId) -> Self {
        Self::UnknownSession { session_id }
    }

    /// Creates a dependency cycle error.
    #[inline]
    pub fn dependency_cycle(path: Vec<String>) -> Self {
        Self::DependencyCycle { path }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    ///
    /// Connection errors are fatal to the whole connection.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error only affects the call that received it.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::Decode { .. }
                | Self::RequestTimeout { .. }
                | Self::SessionDetached { .. }
                | Self::TooManyPending { .. }
        )
    }

    /// Returns the remote error code if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn protocol_code(&self) -> Option<i64> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
