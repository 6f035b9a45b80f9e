//! Rule evaluation: events in, deduplicated notification entries out.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use herald_types::{normalize_domain, normalize_timestamp, Event};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::entry::{NotificationEntry, NotificationLog};
use crate::rule::{NotificationConfig, Relevance, Rule};
use crate::template::{render, Variables};

/// Payload fields copied into the template variables when present.
const OPTIONAL_VARIABLES: [&str; 6] = [
    "source_url",
    "target_url",
    "source_domain",
    "target_domain",
    "in_reply_to",
    "comment_url",
];

/// Fields checked, in order, for the post a notification is about.
const POST_NAME_SOURCES: [&str; 4] = ["target_url", "url", "in_reply_to", "comment_url"];

/// Fields checked, in order, for the content identifier of a dedupe key.
const IDENTIFIER_SOURCES: [&str; 3] = ["source_url", "url", "target_domain"];

const PAYLOAD_HASH_LEN: usize = 12;

/// Who "self" is while evaluating rules.
#[derive(Debug, Clone)]
pub struct NotificationContext<'a> {
    local_domain: String,
    followed: Option<&'a BTreeSet<String>>,
}

impl<'a> NotificationContext<'a> {
    pub fn new(local_domain: &str) -> Self {
        Self {
            local_domain: normalize_domain(local_domain),
            followed: None,
        }
    }

    /// Restricts `followed_author` rules to actors in `followed` (normalized
    /// domains). Without a followed set those rules accept any actor other
    /// than the local domain, on the assumption that the fetch query already
    /// narrowed the authors.
    pub fn with_followed(mut self, followed: &'a BTreeSet<String>) -> Self {
        self.followed = Some(followed);
        self
    }

    pub fn local_domain(&self) -> &str {
        &self.local_domain
    }

    fn is_local(&self, domain: &str) -> bool {
        normalize_domain(domain) == self.local_domain
    }
}

/// Evaluates every enabled rule against `events`, appending new entries to
/// `log`. Returns the number of entries added.
///
/// Events from the local domain or from muted domains never notify. An entry
/// whose dedupe key already exists in `log`, from this batch or any earlier
/// one, is not added again.
pub fn process_events(
    events: &[Event],
    config: &NotificationConfig,
    ctx: &NotificationContext<'_>,
    log: &mut NotificationLog,
) -> usize {
    let mut seen: HashSet<String> = log.entries.iter().map(|entry| entry.id.clone()).collect();
    let mut added = 0;

    for event in events {
        if ctx.is_local(&event.actor) {
            continue;
        }
        if config.is_muted(&event.actor) {
            tracing::debug!(event_id = %event.id, actor = %event.actor, "muted actor");
            continue;
        }

        let mut vars: Option<Variables> = None;
        for rule in config.matching_rules(&event.event_type) {
            if !is_relevant(rule, event, ctx) {
                continue;
            }

            let id = dedupe_key(&rule.id, event);
            if seen.contains(&id) {
                continue;
            }

            let vars = vars.get_or_insert_with(|| build_variables(event));
            log.entries.push(NotificationEntry {
                id: id.clone(),
                rule_id: rule.id.clone(),
                actor: normalize_domain(&event.actor),
                icon: rule.template.icon.clone(),
                message: render(&rule.template.message, vars),
                link: render(&rule.template.link, vars),
                event_ids: vec![event.id.clone()],
                created_at: normalize_timestamp(&event.timestamp, Utc::now()),
                read_at: None,
            });
            seen.insert(id);
            added += 1;
        }
    }

    if added > 0 {
        log.sort();
        tracing::debug!(added, total = log.len(), "appended notifications");
    }
    added
}

fn is_relevant(rule: &Rule, event: &Event, ctx: &NotificationContext<'_>) -> bool {
    match rule.filter.relevance {
        Relevance::TargetDomain => event
            .payload_str("target_domain")
            .is_some_and(|domain| ctx.is_local(domain)),
        Relevance::SourceDomain => event
            .payload_str("source_domain")
            .is_some_and(|domain| ctx.is_local(domain)),
        Relevance::FollowedAuthor => match ctx.followed {
            Some(followed) => followed.contains(&normalize_domain(&event.actor)),
            None => true,
        },
    }
}

/// Builds the template variables for `event`.
///
/// Always present: `actor`, `timestamp`. When present in the payload:
/// the URL and domain fields, `post_name` (last path segment of the first
/// non-empty of `target_url`, `url`, `in_reply_to`, `comment_url`, minus a
/// `.md` extension) and `title` (from `metadata.title`).
pub fn build_variables(event: &Event) -> Variables {
    let mut vars = Variables::new();
    vars.insert("actor".to_string(), event.actor.clone());
    vars.insert("timestamp".to_string(), event.timestamp.clone());

    for key in OPTIONAL_VARIABLES {
        if let Some(value) = event.payload_str(key) {
            vars.insert(key.to_string(), value.to_string());
        }
    }

    if let Some(name) = POST_NAME_SOURCES
        .iter()
        .find_map(|key| event.payload_str(key))
        .and_then(post_name)
    {
        vars.insert("post_name".to_string(), name);
    }

    if let Some(title) = event
        .payload_value("metadata")
        .and_then(|metadata| metadata.get("title"))
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
    {
        vars.insert("title".to_string(), title.to_string());
    }

    vars
}

/// `<rule id>:<content identifier>`.
pub fn dedupe_key(rule_id: &str, event: &Event) -> String {
    format!("{rule_id}:{}", content_identifier(event))
}

/// The first of `source_url`, `url`, `target_domain` present in the payload,
/// else a short hash of the whole payload.
pub fn content_identifier(event: &Event) -> String {
    if let Some(identifier) = IDENTIFIER_SOURCES
        .iter()
        .find_map(|key| event.payload_str(key))
    {
        return identifier.to_string();
    }

    // serde_json maps serialize with sorted keys, so equal payloads hash equally.
    let canonical = serde_json::to_string(&event.payload).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(PAYLOAD_HASH_LEN);
    hash
}

fn post_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let name = segment.strip_suffix(".md").unwrap_or(segment);
    (!name.is_empty()).then(|| name.to_string())
}
