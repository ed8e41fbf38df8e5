//! Event message types.
//!
//! Events are notifications pushed by the remote end without a command
//! `id`. They are never stored, only forwarded to matching subscriptions.
//!
//! # Patterns
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `"*"` | every event |
//! | `"Network.*"` or `"Network"` | every event of one domain |
//! | `"Network.requestWillBeSent"` | one event |

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "sessionId": "...",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Session the event belongs to (root session when `None`).
    pub session_id: Option<SessionId>,

    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    pub params: Value,
}

impl Event {
    /// Returns the domain part of the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        split_method(&self.method).0
    }

    /// Returns the event name part of the method.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        split_method(&self.method).1
    }

    /// Decodes the params into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] carrying the raw params on mismatch.
    pub fn decode<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(&self.params)
            .map_err(|source| Error::decode(&self.method, self.params.clone(), source))
    }
}

/// Splits `Domain.name` at the first dot.
fn split_method(method: &str) -> (&str, &str) {
    method.split_once('.').unwrap_or((method, ""))
}

// ============================================================================
// EventPattern
// ============================================================================

/// Filter on `(domain, name)` with wildcard support.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventPattern {
    /// Every event.
    All,
    /// Every event of one domain.
    Domain(String),
    /// Exactly one event.
    Exact {
        /// Domain name.
        domain: String,
        /// Event name.
        name: String,
    },
}

impl EventPattern {
    /// Parses a pattern from `"*"`, `"Domain.*"`, `"Domain"` or `"Domain.event"`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        match pattern.split_once('.') {
            _ if pattern == "*" => Self::All,
            None => Self::Domain(pattern.to_string()),
            Some((domain, "*")) => Self::Domain(domain.to_string()),
            Some((domain, name)) => Self::Exact {
                domain: domain.to_string(),
                name: name.to_string(),
            },
        }
    }

    /// Pattern matching every event of `domain`.
    #[inline]
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self::Domain(domain.into())
    }

    /// Returns `true` if the event matches.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let (domain, name) = split_method(&event.method);
        match self {
            Self::All => true,
            Self::Domain(d) => d == domain,
            Self::Exact {
                domain: d,
                name: n,
            } => d == domain && n == name,
        }
    }
}

impl FromStr for EventPattern {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for EventPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Domain(domain) => write!(f, "{domain}.*"),
            Self::Exact { domain, name } => write!(f, "{domain}.{name}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    fn event(method: &str) -> Event {
        Event {
            session_id: None,
            method: method.to_string(),
            params: json!({}),
        }
    }

    #[test]
    fn test_event_domain_and_name() {
        let e = event("Network.requestWillBeSent");
        assert_eq!(e.domain(), "Network");
        assert_eq!(e.name(), "requestWillBeSent");

        let odd = event("Inspector");
        assert_eq!(odd.domain(), "Inspector");
        assert_eq!(odd.name(), "");
    }

    #[test]
    fn test_pattern_matching() {
        let load = event("Page.loadEventFired");

        assert!(EventPattern::All.matches(&load));
        assert!(EventPattern::parse("Page.*").matches(&load));
        assert!(EventPattern::parse("Page").matches(&load));
        assert!(EventPattern::parse("Page.loadEventFired").matches(&load));
        assert!(!EventPattern::parse("Page.frameNavigated").matches(&load));
        assert!(!EventPattern::parse("Network.*").matches(&load));
        assert!(!EventPattern::parse("Pag.*").matches(&load));
    }

    #[test]
    fn test_event_decode() {
        #[derive(Debug, Deserialize)]
        struct Load {
            timestamp: f64,
        }

        let mut e = event("Page.loadEventFired");
        e.params = json!({"timestamp": 2.0});
        let load: Load = e.decode().expect("decode");
        assert!((load.timestamp - 2.0).abs() < f64::EPSILON);

        e.params = json!({"timestamp": "soon"});
        let err = e.decode::<Load>().unwrap_err();
        assert!(matches!(err, Error::Decode { ref payload, .. } if payload["timestamp"] == "soon"));
    }

    proptest! {
        #[test]
        fn prop_exact_pattern_display_roundtrip(domain in "[A-Z][A-Za-z]{0,12}", name in "[a-z][A-Za-z]{0,16}") {
            let method = format!("{domain}.{name}");
            let pattern = EventPattern::parse(&method);
            prop_assert_eq!(pattern.to_string(), method.clone());
            prop_assert!(pattern.matches(&event(&method)));
        }

        #[test]
        fn prop_domain_pattern_matches_any_event_of_domain(domain in "[A-Z][A-Za-z]{0,12}", name in "[a-z][A-Za-z]{0,16}", other in "[a-z][A-Za-z]{0,16}") {
            let pattern = EventPattern::parse(&format!("{domain}.*"));
            let same_domain = event(&format!("{domain}.{name}"));
            let other_domain = event(&format!("{domain}X.{other}"));
            prop_assert!(pattern.matches(&same_domain));
            prop_assert!(!pattern.matches(&other_domain));
        }
    }
}
