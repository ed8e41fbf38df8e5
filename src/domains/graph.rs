//! Declared domain dependencies.
//!
//! A [`DomainGraph`] maps each domain to the domains that must be enabled
//! before it. Domains never declared are leaves that still need
//! `Domain.enable`. Passive domains have no `enable` command: resolving
//! them enables their dependencies and nothing else.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};

// ============================================================================
// Chrome Defaults
// ============================================================================

/// `(domain, dependencies)` for domains with an `enable` command.
const CHROME_DOMAINS: &[(&str, &[&str])] = &[
    ("Accessibility", &["DOM"]),
    ("Animation", &["Runtime", "DOM"]),
    ("ApplicationCache", &["Page"]),
    ("Audits", &["Network"]),
    ("CSS", &["DOM", "Page"]),
    ("Console", &["Runtime"]),
    ("DOM", &[]),
    ("DOMSnapshot", &["CSS", "DOM", "DOMDebugger", "Page"]),
    ("DOMStorage", &[]),
    ("Database", &[]),
    ("Debugger", &["Runtime"]),
    ("Fetch", &["Network", "IO", "Page"]),
    ("HeadlessExperimental", &["Page", "Runtime"]),
    ("HeapProfiler", &["Runtime"]),
    ("IndexedDB", &["Runtime"]),
    ("Inspector", &[]),
    ("LayerTree", &["DOM"]),
    ("Log", &["Runtime", "Network"]),
    ("Media", &[]),
    ("Network", &[]),
    ("Overlay", &["DOM", "Page"]),
    ("Page", &["Debugger", "DOM", "IO", "Network", "Runtime"]),
    ("Performance", &[]),
    ("Profiler", &["Runtime", "Debugger"]),
    ("Runtime", &[]),
    ("Security", &[]),
    ("ServiceWorker", &[]),
    ("WebAudio", &[]),
    ("WebAuthn", &[]),
];

/// `(domain, dependencies)` for domains without an `enable` command.
const CHROME_PASSIVE_DOMAINS: &[(&str, &[&str])] = &[
    ("BackgroundService", &[]),
    ("Browser", &[]),
    ("DOMDebugger", &["DOM", "Debugger", "Runtime"]),
    ("DeviceOrientation", &[]),
    ("IO", &[]),
    ("Memory", &[]),
    ("Schema", &[]),
    ("SystemInfo", &[]),
    ("Target", &[]),
    ("Tethering", &[]),
    ("Tracing", &["IO"]),
];

// ============================================================================
// DomainNode
// ============================================================================

/// One declared domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainNode {
    /// Domains to enable first, in declaration order.
    pub dependencies: Vec<String>,
    /// `true` if the domain has no `enable` command.
    pub passive: bool,
}

// ============================================================================
// DomainGraph
// ============================================================================

/// Domain dependency declarations.
#[derive(Debug, Clone, Default)]
pub struct DomainGraph {
    nodes: FxHashMap<String, DomainNode>,
}

impl DomainGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the graph of Chrome's standard domains.
    #[must_use]
    pub fn chrome() -> Self {
        let mut graph = Self::new();
        for (domain, dependencies) in CHROME_DOMAINS {
            graph.declare(*domain, dependencies.iter().copied());
        }
        for (domain, dependencies) in CHROME_PASSIVE_DOMAINS {
            graph.declare_passive(*domain, dependencies.iter().copied());
        }
        graph
    }

    /// Declares (or redeclares) a domain and its dependencies.
    pub fn declare<I, S>(&mut self, domain: impl Into<String>, dependencies: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(domain.into(), dependencies, false)
    }

    /// Declares a domain without an `enable` command.
    pub fn declare_passive<I, S>(&mut self, domain: impl Into<String>, dependencies: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(domain.into(), dependencies, true)
    }

    fn insert<I, S>(&mut self, domain: String, dependencies: I, passive: bool) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        self.nodes.insert(
            domain,
            DomainNode {
                dependencies,
                passive,
            },
        );
        self
    }

    /// Returns the declaration of a domain.
    #[inline]
    #[must_use]
    pub fn node(&self, domain: &str) -> Option<&DomainNode> {
        self.nodes.get(domain)
    }

    /// Returns the direct dependencies of a domain.
    #[must_use]
    pub fn dependencies(&self, domain: &str) -> &[String] {
        self.nodes
            .get(domain)
            .map(|node| node.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` if the domain is declared without `enable`.
    #[must_use]
    pub fn is_passive(&self, domain: &str) -> bool {
        self.nodes.get(domain).is_some_and(|node| node.passive)
    }

    /// Returns the number of declared domains.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is declared.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns every domain that must be enabled for `domain`, dependencies
    /// first and `domain` last. Each domain appears once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] if `domain` reaches a cycle. The
    /// path starts and ends with the same domain.
    pub fn enable_order(&self, domain: &str) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut stack = Vec::new();
        let mut done = FxHashSet::default();
        self.visit(domain, &mut stack, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        domain: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut FxHashSet<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains(domain) {
            return Ok(());
        }

        if let Some(start) = stack.iter().position(|entry| *entry == domain) {
            let mut path: Vec<String> = stack[start..].iter().map(|d| (*d).to_string()).collect();
            path.push(domain.to_string());
            return Err(Error::dependency_cycle(path));
        }

        stack.push(domain);
        for dependency in self.dependencies(domain) {
            self.visit(dependency, stack, done, order)?;
        }
        stack.pop();

        done.insert(domain);
        order.push(domain.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
