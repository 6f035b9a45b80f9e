//! Feed item types and configuration.

use herald_types::{domain_from_url, event_types, normalize_domain, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

const ITEM_ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedItemType {
    Post,
    Comment,
}

/// A cached post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFeedItem {
    /// See [`item_id`].
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: FeedItemType,
    #[serde(default)]
    pub title: String,
    pub url: String,
    /// RFC 3339 publication time; the sort key.
    pub published: String,
    /// Content hash advertised by the author, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub author_url: String,
    pub author_domain: String,
    /// For comments, the post replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    /// When this item entered the cache.
    pub cached_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
}

impl CachedFeedItem {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// An item offered to the cache by a fetch, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCandidate {
    pub item_type: FeedItemType,
    pub title: String,
    pub url: String,
    pub published: String,
    pub hash: Option<String>,
    pub author_url: String,
    pub author_domain: String,
    pub target_url: Option<String>,
    pub target_domain: Option<String>,
}

impl FeedCandidate {
    pub fn id(&self) -> String {
        item_id(&self.author_url, &self.url)
    }

    /// Builds a candidate from a `post.*` or `comment.*` content event.
    ///
    /// Returns `None` for other event types and for content events without a
    /// URL.
    pub fn from_event(event: &Event) -> Option<Self> {
        let item_type = match event.event_type.as_str() {
            event_types::POST_PUBLISHED | event_types::POST_REPUBLISHED => FeedItemType::Post,
            event_types::COMMENT_PUBLISHED | event_types::COMMENT_REPUBLISHED => {
                FeedItemType::Comment
            }
            _ => return None,
        };

        let url = match item_type {
            FeedItemType::Post => event.payload_str("url"),
            FeedItemType::Comment => event
                .payload_str("comment_url")
                .or_else(|| event.payload_str("url")),
        }?;

        let title = event
            .payload_value("metadata")
            .and_then(|metadata| metadata.get("title"))
            .and_then(Value::as_str)
            .or_else(|| event.payload_str("title"))
            .unwrap_or_default();

        let actor = normalize_domain(&event.actor);
        let author_url = event
            .payload_str("author_url")
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://{actor}"));
        let author_domain = domain_from_url(&author_url).unwrap_or(actor);

        let target_url = event
            .payload_str("in_reply_to")
            .or_else(|| event.payload_str("target_url"))
            .map(str::to_string);
        let target_domain = event
            .payload_str("target_domain")
            .map(normalize_domain)
            .or_else(|| target_url.as_deref().and_then(domain_from_url));

        Some(Self {
            item_type,
            title: title.to_string(),
            url: url.to_string(),
            published: event
                .payload_str("published")
                .unwrap_or(&event.timestamp)
                .to_string(),
            hash: event.payload_str("hash").map(str::to_string),
            author_url,
            author_domain,
            target_url,
            target_domain,
        })
    }
}

/// Stable id of a feed item: the first 16 hex characters of
/// `SHA-256(author_url + "|" + url)`.
pub fn item_id(author_url: &str, url: &str) -> String {
    let digest = Sha256::digest(format!("{author_url}|{url}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ITEM_ID_LEN);
    id
}

/// User-authored feed preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Minutes after which the cache should be refreshed before display.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u64,
    /// Maximum number of cached items.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Items published longer ago than this are pruned.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

fn default_staleness_minutes() -> u64 {
    15
}

fn default_max_items() -> usize {
    500
}

fn default_max_age_days() -> u32 {
    30
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: default_staleness_minutes(),
            max_items: default_max_items(),
            max_age_days: default_max_age_days(),
        }
    }
}
