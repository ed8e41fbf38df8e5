//! WebSocket transport layer.
//!
//! This module handles the single WebSocket between the local end (Rust)
//! and a DevTools endpoint, and everything multiplexed over it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                    ┌─────────────────┐
//! │  Connection              │                    │  Browser        │
//! │   ├─ Correlator          │     WebSocket      │                 │
//! │   ├─ SessionRegistry     │◄──────────────────►│  root session   │
//! │   ├─ EventBus            │  ws://host:port/…  │  S1, S2, …      │
//! │   └─ DomainResolver      │                    │                 │
//! └──────────────────────────┘                    └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::builder().url(..).connect()` - WebSocket handshake
//! 2. `Connection::call_raw` / `send` - commands on the root session
//! 3. `Connection::attach` - flat-mode [`SessionHandle`] per target
//! 4. `Connection::close` - pending commands fail, subscriptions end
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Command channel trait |
//! | `connection` | WebSocket connection and event loop |
//! | `correlator` | Pending-command table |
//! | `events` | Event fan-out and subscriptions |
//! | `options` | Connection options and builder |
//! | `sessions` | Session registry and handles |

// ============================================================================
// Submodules
// ============================================================================

/// Command channel trait.
pub mod channel;

/// WebSocket connection and event loop.
pub mod connection;

/// Command correlation.
pub mod correlator;

/// Event fan-out.
pub mod events;

/// Connection options.
pub mod options;

/// Flat-mode sessions.
pub mod sessions;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::CommandChannel;
pub use connection::Connection;
pub use correlator::Correlator;
pub use events::{EventBus, EventStream, SessionScope, Subscription};
pub use options::{
    ConnectionBuilder, ConnectionOptions, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MAX_PENDING,
};
pub use sessions::{SessionHandle, SessionInfo};
