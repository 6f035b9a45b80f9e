//! Error types for the notification engine.

/// Errors that can occur while managing rules or notification entries.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No notification with the given id exists.
    #[error("notification not found: {0}")]
    EntryNotFound(String),

    /// No rule with the given id exists.
    #[error("unknown notification rule: {0}")]
    UnknownRule(String),
}
