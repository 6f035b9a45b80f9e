//! Event model for the discovery-service event log.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Dot-namespaced event names used across the network.
pub mod event_types {
    pub const FOLLOW_ANNOUNCED: &str = "follow.announced";
    pub const FOLLOW_REMOVED: &str = "follow.removed";
    pub const BLESSING_REQUESTED: &str = "blessing.requested";
    pub const BLESSING_GRANTED: &str = "blessing.granted";
    pub const BLESSING_DENIED: &str = "blessing.denied";
    pub const COMMENT_PUBLISHED: &str = "comment.published";
    pub const COMMENT_REPUBLISHED: &str = "comment.republished";
    pub const POST_PUBLISHED: &str = "post.published";
    pub const POST_REPUBLISHED: &str = "post.republished";
}

/// Opaque, monotonically increasing position of an event in the remote log.
///
/// Discovery services emit ids either as JSON numbers or strings; both are
/// kept verbatim as text. Two numeric ids compare numerically, anything else
/// compares lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts an id from a raw JSON event, even one that fails to decode
    /// as a full [`Event`].
    pub fn from_raw(raw: &Value) -> Option<Self> {
        match raw.get("id")? {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(Self(n.to_string())),
            RawId::Text(s) if s.is_empty() => {
                Err(serde::de::Error::custom("event id must not be empty"))
            }
            RawId::Text(s) => Ok(Self(s)),
        }
    }
}

/// A single immutable event from the discovery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the remote log.
    pub id: EventId,
    /// Dot-namespaced event name, e.g. `follow.announced`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Domain that originated the event.
    pub actor: String,
    /// Event-type specific fields.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// ISO 8601 timestamp of when the event occurred.
    pub timestamp: String,
}

impl Event {
    /// Returns a payload field as a string, treating empty strings as absent.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        match self.payload.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a raw payload field.
    pub fn payload_value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Returns `true` if this event's type is `event_type`.
    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}
