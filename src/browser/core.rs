//! Browser façade.
//!
//! A [`Browser`] bundles the discovered endpoint, its [`Connection`] and a
//! [`TargetManager`], and applies the configured defaults to new targets.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Result;
use crate::identifiers::TargetId;
use crate::protocol::target::TargetInfo;
use crate::transport::{Connection, SessionHandle};

use super::builder::{BrowserBuilder, BrowserOptions};
use super::discovery::VersionInfo;
use super::targets::{NewTarget, TargetManager};

// ============================================================================
// Browser
// ============================================================================

/// A connected browser.
pub struct Browser {
    options: BrowserOptions,
    version: VersionInfo,
    connection: Connection,
    targets: TargetManager,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("address", &self.options.address)
            .field("browser", &self.version.browser)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Browser - Constructor
// ============================================================================

impl Browser {
    pub(crate) fn new(
        options: BrowserOptions,
        version: VersionInfo,
        connection: Connection,
        targets: TargetManager,
    ) -> Self {
        Self {
            options,
            version,
            connection,
            targets,
        }
    }

    /// Returns a builder for a new browser connection.
    #[inline]
    #[must_use]
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Connects to the DevTools endpoint at `address` with default settings.
    ///
    /// # Errors
    ///
    /// See [`BrowserBuilder::connect`].
    pub async fn connect(address: impl Into<String>) -> Result<Self> {
        BrowserBuilder::new().address(address).connect().await
    }
}

// ============================================================================
// Browser - Accessors
// ============================================================================

impl Browser {
    /// Returns what `/json/version` reported.
    #[inline]
    #[must_use]
    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    /// Returns the settings applied to new targets.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the known page targets.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetInfo> {
        self.targets.list()
    }
}

// ============================================================================
// Browser - Targets
// ============================================================================

impl Browser {
    /// Opens a new target on the blank page with the configured viewport
    /// and context isolation, and attaches to it.
    ///
    /// # Errors
    ///
    /// See [`TargetManager::create`].
    pub async fn new_target(&self) -> Result<SessionHandle> {
        let (width, height) = self.options.viewport;
        let target = NewTarget::new(self.options.blank_page.clone())
            .incognito(self.options.incognito)
            .viewport(width, height);
        self.targets.create(&target).await
    }

    /// Opens a new target with explicit parameters and attaches to it.
    ///
    /// # Errors
    ///
    /// See [`TargetManager::create`].
    pub async fn new_target_with(&self, target: &NewTarget) -> Result<SessionHandle> {
        self.targets.create(target).await
    }

    /// Attaches to an existing target.
    ///
    /// # Errors
    ///
    /// See [`Connection::attach`].
    pub async fn attach(&self, target_id: &TargetId) -> Result<SessionHandle> {
        self.targets.attach(target_id).await
    }

    /// Closes a target opened or attached through this browser.
    ///
    /// # Errors
    ///
    /// See [`TargetManager::close`].
    pub async fn close_target(&self, session: &SessionHandle) -> Result<()> {
        self.targets.close(session).await
    }

    /// Closes the connection. Attached sessions become unusable.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
