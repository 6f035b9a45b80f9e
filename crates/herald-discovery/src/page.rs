//! The event fetch contract: query parameters and decoded pages.

use herald_types::{Event, EventId};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parameters of one event fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Return events after this position. Empty means from the beginning.
    pub cursor: String,
    pub limit: Option<u32>,
    /// Allow-list of event types; empty means all.
    pub types: Vec<String>,
    /// Allow-list of actor domains; empty means all.
    pub actors: Vec<String>,
    /// Only events addressed to this domain.
    pub target: Option<String>,
}

impl EventQuery {
    pub fn since(cursor: impl Into<String>) -> Self {
        Self {
            cursor: cursor.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actors = actors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Query-string pairs. Lists are comma-joined; empty values are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if !self.cursor.is_empty() {
            pairs.push(("cursor", self.cursor.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if !self.types.is_empty() {
            pairs.push(("types", self.types.join(",")));
        }
        if !self.actors.is_empty() {
            pairs.push(("actors", self.actors.join(",")));
        }
        if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("target", target.to_string()));
        }
        pairs
    }
}

/// One page of the event log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    /// Events that decoded, in log order.
    pub events: Vec<Event>,
    /// Position to resume from, as reported by the service.
    pub cursor: Option<String>,
    pub has_more: bool,
    /// Number of events on this page that failed to decode.
    pub skipped: usize,
    /// Highest id on the page, counting events that failed to decode.
    pub max_id: Option<EventId>,
}

impl EventPage {
    /// Where the next fetch should start: the service cursor, else the
    /// highest id seen, else `current`.
    pub fn next_cursor(&self, current: &str) -> String {
        self.cursor
            .clone()
            .filter(|cursor| !cursor.is_empty())
            .or_else(|| self.max_id.as_ref().map(|id| id.as_str().to_string()))
            .unwrap_or_else(|| current.to_string())
    }

    /// Decodes a response body. Only the envelope must be well formed;
    /// individual events that fail to decode are counted in `skipped`.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(body)?;
        Ok(Self::from_raw(envelope.events, envelope.cursor, envelope.has_more))
    }

    pub fn from_raw(raw_events: Vec<Value>, cursor: Option<String>, has_more: bool) -> Self {
        let mut page = Self {
            events: Vec::with_capacity(raw_events.len()),
            cursor,
            has_more,
            skipped: 0,
            max_id: None,
        };

        for raw in raw_events {
            let id = EventId::from_raw(&raw);
            if let Some(id) = id.as_ref() {
                if page.max_id.as_ref().map_or(true, |max| id > max) {
                    page.max_id = Some(id.clone());
                }
            }

            match serde_json::from_value::<Event>(raw) {
                Ok(event) => page.events.push(event),
                Err(e) => {
                    tracing::warn!(
                        event_id = id.as_ref().map(EventId::as_str).unwrap_or("<none>"),
                        error = %e,
                        "skipping malformed event"
                    );
                    page.skipped += 1;
                }
            }
        }

        page
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default, deserialize_with = "opaque_cursor")]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

/// Cursors are opaque; services send them as strings or numbers.
fn opaque_cursor<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
