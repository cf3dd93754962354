//! Provider response payloads and status handling.

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::scrapers::{ListingDetail, ListingSummary, SourceError};

/// One page of search results.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default, alias = "mapResults", alias = "listResults")]
    pub results: Vec<WireSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WireSummary {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub price: Value,
    #[serde(default, alias = "marketingStatusSimplifiedCd", alias = "statusType")]
    pub status: Option<String>,
    #[serde(alias = "detailUrl")]
    pub locator: String,
}

impl From<WireSummary> for ListingSummary {
    fn from(wire: WireSummary) -> Self {
        ListingSummary {
            address: wire.address,
            price: scalar_text(&wire.price),
            status: wire.status,
            locator: wire.locator,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireDetail {
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default, alias = "homeStatus")]
    pub status: Option<String>,
    #[serde(default, alias = "hdpUrl")]
    pub url: Option<String>,
    #[serde(default, alias = "attributionInfo")]
    pub attribution: Option<serde_json::Map<String, Value>>,
}

impl From<WireDetail> for ListingDetail {
    fn from(wire: WireDetail) -> Self {
        ListingDetail {
            address: address_text(&wire.address),
            price: scalar_text(&wire.price),
            status: wire.status,
            url: wire.url,
            attribution: wire.attribution.unwrap_or_default(),
        }
    }
}

/// Strings pass through, numbers are formatted, everything else is dropped.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Addresses come either as a string or as a street/city/state/zip object.
fn address_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(parts) => {
            let joined = ["streetAddress", "city", "state", "zipcode"]
                .iter()
                .filter_map(|k| parts.get(*k).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        other => scalar_text(other),
    }
}

/// Map non-success statuses to source errors.
pub fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        return Err(SourceError::RateLimited { retry_after });
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// Read and decode a JSON body, reporting decode failures as malformed.
pub async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
}
