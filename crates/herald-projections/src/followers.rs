//! Followers projection: who follows the local domain.

use std::collections::BTreeSet;

use herald_types::{event_types, normalize_domain, Event};
use serde::{Deserialize, Serialize};

/// Materialized follower set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerState {
    /// Normalized domains currently following the local domain.
    #[serde(default)]
    pub followers: BTreeSet<String>,
}

impl FollowerState {
    pub fn len(&self) -> usize {
        self.followers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.followers.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.followers.contains(&normalize_domain(domain))
    }

    /// Applies one event. Returns `true` if the set changed.
    ///
    /// Only `follow.announced` and `follow.removed` events whose
    /// `target_domain` is `local_domain` are considered; anything else,
    /// including events without a `target_domain`, is dropped.
    pub fn apply(&mut self, event: &Event, local_domain: &str) -> bool {
        let announced = event.is(event_types::FOLLOW_ANNOUNCED);
        if !announced && !event.is(event_types::FOLLOW_REMOVED) {
            return false;
        }

        let Some(target) = event.payload_str("target_domain") else {
            tracing::debug!(event_id = %event.id, "dropping follow event without target_domain");
            return false;
        };
        if normalize_domain(target) != normalize_domain(local_domain) {
            return false;
        }

        let actor = normalize_domain(&event.actor);
        if actor.is_empty() {
            return false;
        }

        if announced {
            self.followers.insert(actor)
        } else {
            self.followers.remove(&actor)
        }
    }
}

/// Folds `events` into `prior`, returning the updated follower set.
pub fn fold_followers(events: &[Event], prior: FollowerState, local_domain: &str) -> FollowerState {
    events.iter().fold(prior, |mut state, event| {
        state.apply(event, local_domain);
        state
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_types::EventId;
    use serde_json::{json, Map, Value};

    fn event(id: u64, event_type: &str, actor: &str, payload: Value) -> Event {
        let payload: Map<String, Value> = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Event {
            id: EventId::new(id.to_string()),
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            payload,
            timestamp: "2026-03-01T12:00:00Z".to_string(),
        }
    }

    fn follow(id: u64, actor: &str, target: &str) -> Event {
        event(id, event_types::FOLLOW_ANNOUNCED, actor, json!({ "target_domain": target }))
    }

    fn unfollow(id: u64, actor: &str, target: &str) -> Event {
        event(id, event_types::FOLLOW_REMOVED, actor, json!({ "target_domain": target }))
    }

    #[test]
    fn duplicate_announce_is_a_single_follower() {
        let events = vec![follow(1, "alice.com", "bob.com"), follow(2, "alice.com", "bob.com")];

        let state = fold_followers(&events, FollowerState::default(), "bob.com");
        assert_eq!(state.len(), 1);
        assert!(state.contains("alice.com"));
    }

    #[test]
    fn removal_of_absent_follower_is_noop() {
        let state = fold_followers(
            &[unfollow(1, "carol.net", "bob.com")],
            FollowerState::default(),
            "bob.com",
        );
        assert!(state.is_empty());
    }

    #[test]
    fn announce_then_remove() {
        let events = vec![
            follow(1, "alice.com", "bob.com"),
            follow(2, "carol.net", "bob.com"),
            unfollow(3, "alice.com", "bob.com"),
        ];

        let state = fold_followers(&events, FollowerState::default(), "bob.com");
        assert_eq!(
            state.followers.iter().cloned().collect::<Vec<_>>(),
            vec!["carol.net".to_string()]
        );
    }

    #[test]
    fn events_for_other_domains_are_invisible() {
        let events = vec![
            follow(1, "alice.com", "dave.org"),
            event(2, event_types::FOLLOW_ANNOUNCED, "erin.io", json!({})),
            event(3, event_types::FOLLOW_ANNOUNCED, "frank.dev", json!({ "target_domain": 5 })),
        ];

        let state = fold_followers(&events, FollowerState::default(), "bob.com");
        assert!(state.is_empty());
    }

    #[test]
    fn domains_compare_normalized() {
        let events = vec![
            follow(1, "Alice.com", "https://BOB.com/"),
            follow(2, "alice.com", "bob.com"),
        ];

        let state = fold_followers(&events, FollowerState::default(), "bob.com");
        assert_eq!(state.len(), 1);
        assert!(state.contains("ALICE.COM"));
    }

    #[test]
    fn replay_is_idempotent() {
        let events = vec![
            follow(1, "alice.com", "bob.com"),
            follow(2, "carol.net", "bob.com"),
            unfollow(3, "carol.net", "bob.com"),
        ];

        let once = fold_followers(&events, FollowerState::default(), "bob.com");
        let twice = fold_followers(&events, once.clone(), "bob.com");
        assert_eq!(once, twice);
    }

    #[test]
    fn unrelated_event_types_are_ignored() {
        let events = vec![event(
            1,
            event_types::POST_PUBLISHED,
            "alice.com",
            json!({ "target_domain": "bob.com" }),
        )];

        let state = fold_followers(&events, FollowerState::default(), "bob.com");
        assert!(state.is_empty());
    }
}
