//! Discovery service client for Herald.
//!
//! The discovery service serves an ordered, paginated event log. This crate
//! provides:
//!
//! - [`EventQuery`] / [`EventPage`]: the fetch contract. Pages are decoded
//!   event by event so one malformed event never fails a whole page.
//! - [`EventSource`]: the seam the sync driver pulls from. [`DiscoveryClient`]
//!   is the HTTP implementation; tests substitute in-memory sources.
//! - [`Identity`] and the [`signing`] module: Ed25519 signatures in the
//!   OpenSSH `SSHSIG` format, used to authenticate queries.

mod client;
mod error;
mod identity;
mod page;
pub mod signing;

pub use client::{DiscoveryClient, EventSource};
pub use error::{FetchError, SignatureError};
pub use identity::{load_signing_key, Identity, QueryAuth};
pub use page::{EventPage, EventQuery};

/// Header carrying the claimed domain of a signed query.
pub const DOMAIN_HEADER: &str = "X-Herald-Domain";
/// Header carrying the RFC 3339 timestamp that was signed.
pub const TIMESTAMP_HEADER: &str = "X-Herald-Timestamp";
/// Header carrying the base64-encoded armored SSHSIG signature.
pub const SIGNATURE_HEADER: &str = "X-Herald-Signature";
