//! Per-session domain enablement.
//!
//! A [`DomainResolver`] tracks which domains are enabled on one session and
//! enables missing ones, dependencies first. Each domain has a single-flight
//! cell: concurrent callers share one `Domain.enable` command, and a failed
//! enable leaves the cell empty so the next caller retries.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::CommandChannel;

use super::DomainGraph;

// ============================================================================
// DomainResolver
// ============================================================================

/// Enabled-domain state of one session.
#[derive(Debug)]
pub struct DomainResolver {
    /// Shared dependency declarations.
    graph: Arc<RwLock<DomainGraph>>,
    /// Single-flight enable cell per domain.
    states: Mutex<FxHashMap<String, Arc<OnceCell<()>>>>,
}

impl DomainResolver {
    /// Creates a resolver with nothing enabled.
    #[must_use]
    pub fn new(graph: Arc<RwLock<DomainGraph>>) -> Self {
        Self {
            graph,
            states: Mutex::new(FxHashMap::default()),
        }
    }

    /// Enables `domain` and everything it depends on, in dependency order.
    ///
    /// Already enabled domains are skipped. Passive domains are marked
    /// enabled without sending anything.
    ///
    /// # Errors
    ///
    /// - [`Error::DependencyCycle`] before any command is sent
    /// - the error of the first `enable` command that fails; domains
    ///   enabled before it stay enabled
    pub async fn ensure_enabled<C>(&self, channel: &C, domain: &str) -> Result<()>
    where
        C: CommandChannel + ?Sized,
    {
        let plan: Vec<(String, bool)> = {
            let graph = self.graph.read();
            graph
                .enable_order(domain)?
                .into_iter()
                .map(|name| {
                    let passive = graph.is_passive(&name);
                    (name, passive)
                })
                .collect()
        };

        for (name, passive) in plan {
            let cell = self.cell(&name);
            if cell.initialized() {
                continue;
            }

            cell.get_or_try_init(|| async {
                if !passive {
                    let method = format!("{name}.enable");
                    if let Err(e) = channel.call_raw(&method, None).await {
                        warn!(domain = %name, error = %e, "Domain enable failed");
                        return Err(e);
                    }
                }
                debug!(domain = %name, passive, "Domain enabled");
                Ok::<(), Error>(())
            })
            .await?;
        }

        Ok(())
    }

    /// Returns `true` if `domain` is enabled.
    #[must_use]
    pub fn is_enabled(&self, domain: &str) -> bool {
        self.states
            .lock()
            .get(domain)
            .is_some_and(|cell| cell.initialized())
    }

    /// Returns the enabled domains, sorted.
    #[must_use]
    pub fn enabled_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .states
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        domains.sort();
        domains
    }

    /// Returns the graph this resolver reads.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Arc<RwLock<DomainGraph>> {
        &self.graph
    }

    fn cell(&self, domain: &str) -> Arc<OnceCell<()>> {
        let mut states = self.states.lock();
        Arc::clone(states.entry(domain.to_string()).or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================
