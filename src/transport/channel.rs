//! Command channel abstraction.
//!
//! Anything that can send a raw command and await its result: the root
//! session of a [`Connection`](super::Connection) or one
//! [`SessionHandle`](super::SessionHandle).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Sends raw commands on one session.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Sends `method` with optional params and awaits the raw result.
    async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value>;
}
