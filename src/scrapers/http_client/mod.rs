//! HTTP/JSON listing source.

mod response;
mod user_agent;

pub use response::{SearchPage, WireDetail, WireSummary};
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{ListingDetail, ListingSource, ListingSummary, SourceError};
use crate::models::SearchConfig;
use response::{check_status, decode_json};

/// Connection settings for [`HttpListingSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Provider API root; search is `GET {base}/search`, details resolve
    /// locators against it.
    pub base_url: String,
    /// Optional HTTP/SOCKS proxy for every request.
    pub proxy_url: Option<String>,
    /// None, "browser" or a literal user agent.
    pub user_agent: Option<String>,
    pub request_timeout: Duration,
    /// Pause between result pages.
    pub page_delay: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787/".to_string(),
            proxy_url: None,
            user_agent: None,
            request_timeout: Duration::from_secs(30),
            page_delay: Duration::from_millis(250),
        }
    }
}

/// Listing source backed by a JSON HTTP API.
#[derive(Clone)]
pub struct HttpListingSource {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    page_delay: Duration,
}

impl HttpListingSource {
    /// Build the client. Fails on an invalid base URL or proxy.
    pub fn new(config: &HttpSourceConfig) -> Result<Self, SourceError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| SourceError::Other(format!("invalid base URL: {}", e)))?;

        let mut builder = Client::builder()
            .user_agent(resolve_user_agent(config.user_agent.as_deref()))
            .timeout(config.request_timeout)
            .gzip(true)
            .brotli(true);
        if let Some(proxy) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            request_timeout: config.request_timeout,
            page_delay: config.page_delay,
        })
    }

    /// Search endpoint URL for one page.
    pub fn search_url(&self, config: &SearchConfig, page: u32) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join("search")
            .map_err(|e| SourceError::Other(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", &config.search_value)
            .append_pair("ne_lat", &config.bounds.ne_lat.to_string())
            .append_pair("ne_long", &config.bounds.ne_long.to_string())
            .append_pair("sw_lat", &config.bounds.sw_lat.to_string())
            .append_pair("sw_long", &config.bounds.sw_long.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Resolve a locator: absolute URLs are used as-is, paths join the base.
    pub fn detail_url(&self, locator: &str) -> Result<Url, SourceError> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(_) => self
                .base_url
                .join(locator.trim_start_matches('/'))
                .map_err(|e| SourceError::Malformed(format!("bad locator {:?}: {}", locator, e))),
        }
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, SourceError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.request_timeout)
            } else {
                SourceError::Http(e)
            }
        })?;
        check_status(response)
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn search(
        &self,
        config: &SearchConfig,
        pagination: u32,
    ) -> Result<Vec<ListingSummary>, SourceError> {
        let mut summaries = Vec::new();
        for page in 1..=pagination.max(1) {
            if page > 1 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            let response = self.get(self.search_url(config, page)?).await?;
            let body: SearchPage = decode_json(response).await?;
            if body.results.is_empty() {
                break;
            }
            summaries.extend(body.results.into_iter().map(ListingSummary::from));
        }
        Ok(summaries)
    }

    async fn fetch_detail(&self, locator: &str) -> Result<ListingDetail, SourceError> {
        let url = self.detail_url(locator)?;
        let response = self.get(url.clone()).await?;
        let wire: WireDetail = decode_json(response).await?;
        let mut detail = ListingDetail::from(wire);
        if detail.url.is_none() {
            detail.url = Some(url.to_string());
        }
        Ok(detail)
    }
}
