//! Followed-domains list maintained by the external following manager.

use std::collections::BTreeSet;
use std::path::Path;

use herald_types::normalize_domain;

use crate::error::FollowingError;

/// Reads the set of followed domains from `path`.
///
/// The file is either a JSON array of strings or plain text with one domain
/// per line; blank lines and `#` comments are ignored. Domains are
/// normalized.
pub fn load_following(path: impl AsRef<Path>) -> Result<BTreeSet<String>, FollowingError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| FollowingError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let trimmed = contents.trim_start();
    let raw: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|source| FollowingError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    };

    Ok(raw
        .iter()
        .map(|domain| normalize_domain(domain))
        .filter(|domain| !domain.is_empty())
        .collect())
}
