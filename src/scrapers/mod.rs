//! Listing source adapters.
//!
//! The run executor only ever talks to a [`ListingSource`]; the HTTP
//! adapter in [`http_client`] is the one shipped with the binary.

pub mod attribution;
pub mod http_client;
pub mod retry;

pub use attribution::{flatten_attribution, normalize_listing};
pub use http_client::{HttpListingSource, HttpSourceConfig};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SearchConfig;

/// Failure talking to the listing provider.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

/// One search hit, as returned by the provider's map/search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub address: String,
    pub price: Option<String>,
    /// Provider status tag, e.g. "FOR_SALE".
    pub status: Option<String>,
    /// Opaque handle passed back to `fetch_detail`.
    pub locator: String,
}

/// Full listing detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub address: Option<String>,
    pub price: Option<String>,
    pub status: Option<String>,
    /// Canonical listing URL.
    pub url: Option<String>,
    /// Schema-less attribution info, provider keys as-is.
    #[serde(default)]
    pub attribution: serde_json::Map<String, serde_json::Value>,
}

/// Source of listing data.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Search a configuration's area, `pagination` pages deep.
    async fn search(
        &self,
        config: &SearchConfig,
        pagination: u32,
    ) -> Result<Vec<ListingSummary>, SourceError>;

    /// Fetch the detail record for one summary's locator.
    async fn fetch_detail(&self, locator: &str) -> Result<ListingDetail, SourceError>;
}
