//! HTTP event source.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::error::FetchError;
use crate::identity::Identity;
use crate::page::{EventPage, EventQuery};
use crate::{DOMAIN_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Anything that can serve pages of the event log.
pub trait EventSource {
    /// Fetches the page described by `query`.
    ///
    /// Any error is a transport failure; the caller retries from the same
    /// cursor on its next cycle.
    fn fetch(&self, query: &EventQuery) -> impl Future<Output = Result<EventPage, FetchError>> + Send;
}

/// Client for a discovery service's `GET /events` endpoint.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    events_url: Url,
    identity: Option<Identity>,
}

impl DiscoveryClient {
    /// Builds a client for the service at `base_url`.
    ///
    /// With an `identity`, every query carries signed authentication headers.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if `base_url` does not parse and
    /// `FetchError::Http` if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        identity: Option<Identity>,
    ) -> Result<Self, FetchError> {
        let events_url = Url::parse(&format!("{}/events", base_url.trim_end_matches('/')))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("herald-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            events_url,
            identity,
        })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }

    /// The domain of the service, used to namespace local state.
    pub fn service_domain(&self) -> &str {
        self.events_url.host_str().unwrap_or_default()
    }
}

impl EventSource for DiscoveryClient {
    async fn fetch(&self, query: &EventQuery) -> Result<EventPage, FetchError> {
        let mut request = self
            .http
            .get(self.events_url.clone())
            .query(&query.to_pairs());

        if let Some(identity) = &self.identity {
            let auth = identity.authorize(Utc::now());
            request = request
                .header(DOMAIN_HEADER, auth.domain)
                .header(TIMESTAMP_HEADER, auth.timestamp)
                .header(SIGNATURE_HEADER, auth.signature);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page = EventPage::from_json(&body)?;
        tracing::debug!(
            url = %self.events_url,
            cursor = %query.cursor,
            events = page.events.len(),
            skipped = page.skipped,
            has_more = page.has_more,
            "fetched event page"
        );
        Ok(page)
    }
}
