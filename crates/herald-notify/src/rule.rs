//! Rule schema, default rule set, and notification configuration.

use std::collections::BTreeSet;

use herald_types::{event_types, normalize_domain};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Which field of an event decides whether it concerns the local domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    /// The event's `target_domain` is the local domain.
    TargetDomain,
    /// The event's `source_domain` is the local domain.
    SourceDomain,
    /// The event's actor is an author the local domain follows.
    FollowedAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    pub relevance: Relevance,
}

/// Presentation of a notification. `message` and `link` accept `{{var}}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub icon: String,
    pub message: String,
    #[serde(default)]
    pub link: String,
}

/// One row of the notification rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub event_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub filter: RuleFilter,
    pub template: Template,
    /// Reserved for coalescing bursts into one notification. Persisted but
    /// not yet acted on.
    #[serde(default)]
    pub batch: bool,
    /// Reserved window for `batch`, e.g. `"1h"`. Persisted but not yet acted
    /// on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_window: Option<String>,
}

fn default_true() -> bool {
    true
}

fn rule(
    id: &str,
    event_type: &str,
    enabled: bool,
    relevance: Relevance,
    icon: &str,
    message: &str,
    link: &str,
) -> Rule {
    Rule {
        id: id.to_string(),
        event_type: event_type.to_string(),
        enabled,
        filter: RuleFilter { relevance },
        template: Template {
            icon: icon.to_string(),
            message: message.to_string(),
            link: link.to_string(),
        },
        batch: false,
        batch_window: None,
    }
}

/// The built-in rule table.
///
/// The two "republished" rules ship disabled.
pub fn default_rules() -> Vec<Rule> {
    use Relevance::{FollowedAuthor, SourceDomain, TargetDomain};

    vec![
        rule(
            "new-follower",
            event_types::FOLLOW_ANNOUNCED,
            true,
            TargetDomain,
            "👤",
            "{{actor}} started following you",
            "https://{{actor}}",
        ),
        rule(
            "lost-follower",
            event_types::FOLLOW_REMOVED,
            true,
            TargetDomain,
            "👋",
            "{{actor}} stopped following you",
            "https://{{actor}}",
        ),
        rule(
            "blessing-requested",
            event_types::BLESSING_REQUESTED,
            true,
            TargetDomain,
            "🙏",
            "{{actor}} asked you to bless a comment on {{post_name}}",
            "{{source_url}}",
        ),
        rule(
            "blessing-granted",
            event_types::BLESSING_GRANTED,
            true,
            SourceDomain,
            "✨",
            "{{actor}} blessed your comment on {{post_name}}",
            "{{target_url}}",
        ),
        rule(
            "blessing-denied",
            event_types::BLESSING_DENIED,
            true,
            SourceDomain,
            "🚫",
            "{{actor}} declined your comment on {{post_name}}",
            "{{target_url}}",
        ),
        rule(
            "new-comment",
            event_types::COMMENT_PUBLISHED,
            true,
            TargetDomain,
            "💬",
            "{{actor}} commented on {{post_name}}",
            "{{comment_url}}",
        ),
        rule(
            "comment-republished",
            event_types::COMMENT_REPUBLISHED,
            false,
            TargetDomain,
            "💬",
            "{{actor}} updated a comment on {{post_name}}",
            "{{comment_url}}",
        ),
        rule(
            "new-post",
            event_types::POST_PUBLISHED,
            true,
            FollowedAuthor,
            "📝",
            "{{actor}} published {{post_name}}",
            "https://{{actor}}",
        ),
        rule(
            "post-republished",
            event_types::POST_REPUBLISHED,
            false,
            FollowedAuthor,
            "📝",
            "{{actor}} updated {{post_name}}",
            "https://{{actor}}",
        ),
    ]
}

/// User-authored notification preferences.
///
/// Defaults apply on first read; the value is persisted only when the user
/// changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minutes after which the notification view should be refreshed.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u64,
    /// Maximum number of notifications kept.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Notifications older than this many days are pruned.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,
    /// Domains whose events never notify.
    #[serde(default)]
    pub muted_domains: BTreeSet<String>,
}

fn default_staleness_minutes() -> u64 {
    15
}

fn default_max_items() -> usize {
    500
}

fn default_max_age_days() -> u32 {
    90
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: default_staleness_minutes(),
            max_items: default_max_items(),
            max_age_days: default_max_age_days(),
            rules: default_rules(),
            muted_domains: BTreeSet::new(),
        }
    }
}

impl NotificationConfig {
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Enabled rules whose event type is `event_type`, in table order.
    pub fn matching_rules<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.enabled && rule.event_type == event_type)
    }

    /// Event types at least one enabled rule listens for. Used as the type
    /// filter when fetching.
    pub fn enabled_event_types(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.enabled)
            .map(|rule| rule.event_type.clone())
            .collect()
    }

    /// Enables or disables a rule.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::UnknownRule` if no rule has this id.
    pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> Result<(), NotifyError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or_else(|| NotifyError::UnknownRule(id.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Replaces the rule with the same id, or appends a new one.
    pub fn upsert_rule(&mut self, new_rule: Rule) {
        match self.rules.iter_mut().find(|rule| rule.id == new_rule.id) {
            Some(existing) => *existing = new_rule,
            None => self.rules.push(new_rule),
        }
    }

    /// Removes a custom or built-in rule.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::UnknownRule` if no rule has this id.
    pub fn remove_rule(&mut self, id: &str) -> Result<Rule, NotifyError> {
        let index = self
            .rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or_else(|| NotifyError::UnknownRule(id.to_string()))?;
        Ok(self.rules.remove(index))
    }

    /// Restores the built-in rule table, discarding customizations.
    pub fn reset_rules(&mut self) {
        self.rules = default_rules();
    }

    /// Mutes a domain. Returns `false` if it was already muted.
    pub fn mute(&mut self, domain: &str) -> bool {
        self.muted_domains.insert(normalize_domain(domain))
    }

    /// Unmutes a domain. Returns `false` if it was not muted.
    pub fn unmute(&mut self, domain: &str) -> bool {
        self.muted_domains.remove(&normalize_domain(domain))
    }

    pub fn is_muted(&self, domain: &str) -> bool {
        self.muted_domains.contains(&normalize_domain(domain))
    }
}
