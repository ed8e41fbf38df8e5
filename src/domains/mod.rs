//! Domain dependency resolution.
//!
//! Many domains only work once other domains are enabled on the same
//! session (`Page` needs `Runtime`, `Network`, `DOM`...). This module keeps
//! the declared dependencies and enables them in order.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `graph` | Dependency declarations and enable ordering |
//! | `resolver` | Per-session enabled state and single-flight enabling |

// ============================================================================
// Submodules
// ============================================================================

/// Dependency declarations.
pub mod graph;

/// Per-session enablement.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use graph::{DomainGraph, DomainNode};
pub use resolver::DomainResolver;
