//! Builder pattern for browser configuration.
//!
//! Provides a fluent API for connecting a [`Browser`] to a running
//! DevTools endpoint.
//!
//! # Example
//!
//! ```ignore
//! use cdp_runtime::Browser;
//!
//! let browser = Browser::builder()
//!     .address("127.0.0.1:9222")
//!     .viewport(1280, 720)
//!     .incognito(false)
//!     .connect()
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::info;

use crate::error::Result;
use crate::transport::{Connection, ConnectionOptions};

use super::core::Browser;
use super::discovery::fetch_version;
use super::targets::TargetManager;

// ============================================================================
// Constants
// ============================================================================

/// Default DevTools HTTP address.
pub const DEFAULT_ADDRESS: &str = "localhost:9222";

/// Default URL of new targets.
pub const DEFAULT_BLANK_PAGE: &str = "about:blank";

/// Default viewport size in pixels.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1024, 768);

/// Smallest accepted viewport edge in pixels.
pub const MIN_VIEWPORT_EDGE: u32 = 100;

// ============================================================================
// BrowserOptions
// ============================================================================

/// Settings applied to targets created through a [`Browser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// DevTools HTTP address (`host:port`).
    pub address: String,
    /// URL new targets open.
    pub blank_page: String,
    /// Viewport of new targets (width, height).
    pub viewport: (u32, u32),
    /// Create new targets in their own browser context.
    pub incognito: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            blank_page: DEFAULT_BLANK_PAGE.to_string(),
            viewport: DEFAULT_VIEWPORT,
            incognito: true,
        }
    }
}

// ============================================================================
// BrowserBuilder
// ============================================================================

/// Builder for connecting a [`Browser`].
///
/// Use [`Browser::builder()`] to create a new builder.
#[derive(Debug, Clone, Default)]
pub struct BrowserBuilder {
    options: BrowserOptions,
    connection: ConnectionOptions,
}

impl BrowserBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the DevTools HTTP address (`host:port`).
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.options.address = address.into();
        self
    }

    /// Sets the URL new targets open.
    #[inline]
    #[must_use]
    pub fn blank_page(mut self, url: impl Into<String>) -> Self {
        self.options.blank_page = url.into();
        self
    }

    /// Sets the viewport of new targets. Each edge is at least 100 pixels.
    #[inline]
    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.options.viewport = (width.max(MIN_VIEWPORT_EDGE), height.max(MIN_VIEWPORT_EDGE));
        self
    }

    /// Creates new targets in their own browser context (default `true`).
    #[inline]
    #[must_use]
    pub fn incognito(mut self, incognito: bool) -> Self {
        self.options.incognito = incognito;
        self
    }

    /// Sets the command timeout of the connection.
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.connection.command_timeout = Some(timeout);
        self
    }

    /// Replaces the connection options.
    #[inline]
    #[must_use]
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection = options;
        self
    }

    /// Returns the browser settings collected so far.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    /// Discovers the endpoint, connects and starts target tracking.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Http`] / [`crate::Error::Discovery`] if
    ///   `/json/version` cannot be queried
    /// - connection errors, see [`crate::ConnectionBuilder::connect`]
    /// - the error of `Target.setDiscoverTargets`
    pub async fn connect(self) -> Result<Browser> {
        let version = fetch_version(&self.options.address).await?;

        let connection = Connection::builder()
            .url(version.web_socket_debugger_url.clone())
            .options(self.connection)
            .connect()
            .await?;
        let targets = TargetManager::start(connection.clone()).await?;

        info!(
            address = %self.options.address,
            browser = %version.browser,
            "Browser connected"
        );

        Ok(Browser::new(self.options, version, connection, targets))
    }
}

// ============================================================================
// Tests
// ============================================================================
