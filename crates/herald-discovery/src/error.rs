//! Error types for discovery fetches and signatures.

use std::path::PathBuf;

/// A fetch that did not produce a page.
///
/// Every variant is a transport failure: the caller must leave its cursor
/// and state untouched and retry later.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The base URL could not be parsed.
    #[error("invalid discovery url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connection, timeout, or other HTTP-level failure.
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("discovery service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a page envelope.
    #[error("invalid discovery response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The query could not be signed.
    #[error("failed to sign query: {0}")]
    Signature(#[from] SignatureError),
}

/// Errors from producing or checking an SSHSIG signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The armor lines or base64 body are malformed.
    #[error("invalid signature armor: {0}")]
    Armor(String),

    /// The decoded blob does not follow the SSHSIG layout.
    #[error("invalid signature format: {0}")]
    Format(String),

    /// A key is malformed or of an unsupported type.
    #[error("invalid key: {0}")]
    Key(String),

    /// A key file could not be read.
    #[error("failed to read key file {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The signature does not match the message and key.
    #[error("signature verification failed")]
    Mismatch,
}
