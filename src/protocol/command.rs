//! Binding traits implemented by generated domain code.
//!
//! Generated bindings describe each command as a params struct that knows
//! its method name and reply shape, and each event as a struct that knows
//! its method name. The runtime only ever sees these traits.
//!
//! ```ignore
//! #[derive(Serialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Navigate { url: String }
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct NavigateReply { frame_id: String }
//!
//! impl Command for Navigate {
//!     const METHOD: &'static str = "Page.navigate";
//!     type Response = NavigateReply;
//! }
//!
//! let reply = session.send(&Navigate { url: "https://example.com".into() }).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Command
// ============================================================================

/// A protocol command: parameters plus the method name and reply shape.
pub trait Command: Serialize + Send + Sync {
    /// Full method name, e.g. `Page.navigate`.
    const METHOD: &'static str;

    /// Shape the `result` object is decoded into.
    type Response: DeserializeOwned + Send;
}

// ============================================================================
// TypedEvent
// ============================================================================

/// A protocol event payload with its method name.
pub trait TypedEvent: DeserializeOwned + Send + 'static {
    /// Full event name, e.g. `Page.loadEventFired`.
    const METHOD: &'static str;
}

// ============================================================================
// NoParams / Empty
// ============================================================================

/// Parameters of a command that takes none.
///
/// Serializes to nothing, so the `params` key is omitted from the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NoParams;

/// Reply of a command whose `result` carries nothing of interest.
///
/// Accepts any payload, including a missing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;

impl<'de> Deserialize<'de> for Empty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IgnoredAny::deserialize(deserializer).map(|_| Self)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Encodes command parameters, mapping "no parameters" to `None`.
///
/// # Errors
///
/// Returns [`crate::Error::Json`] if serialization fails.
pub fn encode_params<P>(params: &P) -> Result<Option<Value>>
where
    P: Serialize + ?Sized,
{
    match serde_json::to_value(params)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

// ============================================================================
// Tests
// ============================================================================
