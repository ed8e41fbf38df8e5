//! Command request and inbound frame types.
//!
//! Defines the outbound command format and the classification of every
//! inbound text frame into a command reply or an event.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

use super::Event;

// ============================================================================
// CommandRequest
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "sessionId": "8D2C...",
///   "method": "Domain.method",
///   "params": { ... }
/// }
/// ```
///
/// `sessionId` and `params` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    /// Identifier for reply correlation.
    pub id: CommandId,

    /// Target session (root session when `None`).
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl CommandRequest {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(
        id: CommandId,
        session_id: Option<SessionId>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            id,
            session_id,
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// ResponseError
// ============================================================================

/// The `error` object of a failed command reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// Error code.
    pub code: i64,

    /// Error message.
    pub message: String,

    /// Additional error data, usually a string.
    #[serde(default)]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Reads an `error` object, tolerating missing or mistyped fields.
    ///
    /// A malformed object still yields an error for its command: the code
    /// falls back to 0, the message to a placeholder, and the raw object is
    /// kept as `data`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if let Ok(error) = Self::deserialize(&value) {
            return error;
        }

        Self {
            code: value.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("malformed error object")
                .to_string(),
            data: Some(value),
        }
    }

    /// Converts into a crate [`Error::Protocol`] for the given method.
    #[must_use]
    pub fn into_error(self, method: &str) -> Error {
        let data = self.data.map(|data| match data {
            Value::String(text) => text,
            other => other.to_string(),
        });
        Error::protocol(method, self.code, self.message, data)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A reply from remote end to local end for one command.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "sessionId": "...", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "sessionId": "...", "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Session the reply belongs to.
    pub session_id: Option<SessionId>,

    /// `result` payload or `error` object.
    pub outcome: std::result::Result<Value, ResponseError>,
}

impl Response {
    /// Returns `true` if this is a success reply.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Extracts the result value, converting an `error` object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the reply carried an `error`.
    pub fn into_result(self, method: &str) -> Result<Value> {
        self.outcome.map_err(|error| error.into_error(method))
    }
}

// ============================================================================
// InboundFrame
// ============================================================================

/// Every field an inbound frame may carry.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<CommandId>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<SessionId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    params: Option<Value>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to a command (carries `id`).
    Response(Response),
    /// Notification (no `id`, carries `method`).
    Event(Event),
}

impl InboundFrame {
    /// Parses and classifies one inbound text frame.
    ///
    /// A frame with `id` is a reply: `error` wins over `result`, and a reply
    /// with neither resolves to `null`. A frame without `id` but with
    /// `method` is an event.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a JSON object of the expected shape
    /// - [`Error::InvalidFrame`] if the frame has neither `id` nor `method`
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;

        if let Some(id) = raw.id {
            let outcome = match raw.error {
                Some(error) => Err(ResponseError::from_value(error)),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            };
            return Ok(Self::Response(Response {
                id,
                session_id: raw.session_id,
                outcome,
            }));
        }

        match raw.method {
            Some(method) => Ok(Self::Event(Event {
                session_id: raw.session_id,
                method,
                params: raw.params.unwrap_or(Value::Null),
            })),
            None => Err(Error::invalid_frame("frame has neither id nor method")),
        }
    }

    /// Returns the session the frame is tagged with.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Response(response) => response.session_id.as_ref(),
            Self::Event(event) => event.session_id.as_ref(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
