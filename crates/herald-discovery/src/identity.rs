//! The local signing identity and query authentication headers.

use std::path::Path;

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use herald_types::{normalize_domain, to_rfc3339};

use crate::error::SignatureError;
use crate::signing::{canonical_query_document, public_key_openssh, sign};

/// A domain and the key that proves control of it.
///
/// Passed explicitly to [`crate::DiscoveryClient`]; there is no process-wide
/// identity.
#[derive(Clone)]
pub struct Identity {
    domain: String,
    signing_key: SigningKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("domain", &self.domain)
            .field("public_key", &self.public_key_openssh())
            .finish_non_exhaustive()
    }
}

/// Header values authenticating one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAuth {
    pub domain: String,
    pub timestamp: String,
    /// Base64 of the armored signature; armor contains newlines, which
    /// header values cannot.
    pub signature: String,
}

impl Identity {
    pub fn new(domain: &str, signing_key: SigningKey) -> Self {
        Self {
            domain: normalize_domain(domain),
            signing_key,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn public_key_openssh(&self) -> String {
        public_key_openssh(&self.signing_key.verifying_key())
    }

    /// Signs the canonical query document for `now`.
    pub fn authorize(&self, now: DateTime<Utc>) -> QueryAuth {
        let timestamp = to_rfc3339(now);
        let document = canonical_query_document(&self.domain, &timestamp);
        let armored = sign(document.as_bytes(), &self.signing_key);

        QueryAuth {
            domain: self.domain.clone(),
            timestamp,
            signature: base64::engine::general_purpose::STANDARD.encode(armored),
        }
    }
}

/// Reads an Ed25519 seed from `path`.
///
/// The file holds either the raw 32 seed bytes or the seed as 64 hex
/// characters (surrounding whitespace ignored).
///
/// # Errors
///
/// Returns `SignatureError::KeyFile` if the file cannot be read and
/// `SignatureError::Key` if it holds neither form.
pub fn load_signing_key(path: impl AsRef<Path>) -> Result<SigningKey, SignatureError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| SignatureError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;

    if let Ok(seed) = <[u8; 32]>::try_from(bytes.as_slice()) {
        return Ok(SigningKey::from_bytes(&seed));
    }

    let text = std::str::from_utf8(&bytes)
        .map_err(|_| SignatureError::Key("key file is neither raw nor hex".to_string()))?;
    let decoded = hex::decode(text.trim())
        .map_err(|_| SignatureError::Key("key file is neither raw nor hex".to_string()))?;
    let seed: [u8; 32] = decoded
        .try_into()
        .map_err(|_| SignatureError::Key("ed25519 seed must be 32 bytes".to_string()))?;

    Ok(SigningKey::from_bytes(&seed))
}
