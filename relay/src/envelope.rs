//! Event normalization.
//!
//! Raw request fields are turned into immutable [`EventEnvelope`] values
//! here; the constructors are the only way to build one. Required-field
//! validation happens at the API boundary before these run, never here.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// The user id recorded for track events that carry none.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Free-form traits/properties mapping carried through from the request.
pub type Fields = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Identify,
    Track,
    Alias,
}

impl EventType {
    /// Wire name, used as the final segment of the downstream URL.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::Identify => "identify",
            EventType::Track => "track",
            EventType::Alias => "alias",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized, delivery-ready representation of one analytics event.
///
/// Serializes camelCase with unset optional fields omitted. Which optional
/// fields are populated follows from the event type: identify carries
/// traits, track carries properties, alias carries the previous id plus a
/// top-level timestamp. `event_type` itself is not part of the body; it
/// selects the downstream URL path.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(skip)]
    pub event_type: EventType,
    pub event: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl EventEnvelope {
    /// Identify event. Traits are extended with the previous anonymous id
    /// (when one was supplied) and the identification time.
    pub fn identify<U>(user_id: U, previous_id: Option<&str>, traits: Option<Fields>) -> Self
    where
        U: Into<String>,
    {
        let mut traits = traits.unwrap_or_default();
        if let Some(previous_id) = previous_id {
            traits.insert(
                "previous_anonymous_id".into(),
                Value::String(previous_id.into()),
            );
        }
        traits.insert("identified_at".into(), Value::String(now_iso()));

        EventEnvelope {
            event_type: EventType::Identify,
            event: "identify".into(),
            user_id: user_id.into(),
            previous_id: None,
            traits: Some(traits),
            properties: None,
            timestamp: None,
        }
    }

    /// Alias event linking a previous anonymous id to a user id. Callers
    /// only build one when the previous id is present and differs from the
    /// user id.
    pub fn alias<U, P>(user_id: U, previous_id: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        EventEnvelope {
            event_type: EventType::Alias,
            event: "alias".into(),
            user_id: user_id.into(),
            previous_id: Some(previous_id.into()),
            traits: None,
            properties: None,
            timestamp: Some(now_iso()),
        }
    }

    /// Track event. A missing user id defaults to [`ANONYMOUS_USER`];
    /// properties are extended with the event time.
    pub fn track<N>(event_name: N, user_id: Option<&str>, properties: Option<Fields>) -> Self
    where
        N: Into<String>,
    {
        let mut properties = properties.unwrap_or_default();
        properties.insert("timestamp".into(), Value::String(now_iso()));

        EventEnvelope {
            event_type: EventType::Track,
            event: event_name.into(),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).into(),
            previous_id: None,
            traits: None,
            properties: Some(properties),
            timestamp: None,
        }
    }
}

/// RFC 3339 with millisecond precision and `Z` suffix, e.g.
/// `2026-08-30T12:34:56.789Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
