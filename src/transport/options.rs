//! Connection configuration.
//!
//! [`ConnectionOptions`] holds the tunables of one connection and
//! [`ConnectionBuilder`] opens a connection with them.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cdp_runtime::Connection;
//!
//! let connection = Connection::builder()
//!     .url("ws://127.0.0.1:9222/devtools/browser/3f1c...")
//!     .command_timeout(Duration::from_secs(10))
//!     .connect()
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::timeout;
use tracing::info;
use url::Url;

use crate::domains::DomainGraph;
use crate::error::{Error, Result};

use super::Connection;
use super::connection::duration_ms;

// ============================================================================
// Constants
// ============================================================================

/// Default time a command waits for its reply.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of commands in flight.
pub const DEFAULT_MAX_PENDING: usize = 1024;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Tunables of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Time a command waits for its reply. `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Time allowed for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Maximum number of commands in flight.
    pub max_pending: usize,
    /// Domain dependency declarations shared by every session.
    pub domain_graph: DomainGraph,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
            domain_graph: DomainGraph::chrome(),
        }
    }
}

impl ConnectionOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Lets commands wait for their reply forever.
    #[must_use]
    pub fn without_command_timeout(mut self) -> Self {
        self.command_timeout = None;
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum number of commands in flight.
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Replaces the domain dependency declarations.
    #[must_use]
    pub fn with_domain_graph(mut self, graph: DomainGraph) -> Self {
        self.domain_graph = graph;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero timeouts or a zero pending limit.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be at least 1"));
        }
        if self.command_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("command_timeout must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder opening a [`Connection`] to a DevTools WebSocket endpoint.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ConnectionBuilder {
    url: Option<String>,
    options: ConnectionOptions,
}

impl ConnectionBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `ws://` or `wss://` endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options.command_timeout = Some(timeout);
        self
    }

    /// Lets commands wait for their reply forever.
    pub fn no_command_timeout(mut self) -> Self {
        self.options.command_timeout = None;
        self
    }

    /// Sets the handshake timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the maximum number of commands in flight.
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.options.max_pending = max_pending;
        self
    }

    /// Replaces the domain dependency declarations.
    pub fn domain_graph(mut self, graph: DomainGraph) -> Self {
        self.options.domain_graph = graph;
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the URL and options.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no URL is set, its scheme is not `ws`/`wss`,
    ///   or the options are invalid
    /// - [`Error::Url`] if the URL does not parse
    pub fn validate(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::config("WebSocket URL is required"))?;
        let url = Url::parse(raw)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Unsupported URL scheme '{}', expected ws or wss",
                url.scheme()
            )));
        }

        self.options.validate()?;
        Ok(url)
    }

    /// Performs the WebSocket handshake and starts the connection.
    ///
    /// # Errors
    ///
    /// - validation errors, see [`ConnectionBuilder::validate`]
    /// - [`Error::ConnectionTimeout`] if the handshake takes too long
    /// - [`Error::Connection`] if the handshake fails
    pub async fn connect(self) -> Result<Connection> {
        let url = self.validate()?;
        let limit = self.options.connect_timeout;

        let (ws_stream, _response) = timeout(limit, tokio_tungstenite::connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(duration_ms(limit)))?
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        info!(url = %url, "Connected to DevTools endpoint");

        Ok(Connection::from_stream(ws_stream, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================
