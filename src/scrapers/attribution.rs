//! Listing normalization.
//!
//! Provider attribution keys are camelCase and open-ended. Each key is
//! resolved once here: a known alias, else a derived snake_case name. Names
//! that match a fixed attribution field go there; the rest are kept in the
//! extra map under the provider's own key.
//!
//! Fixed columns hold text. Strings are stored as-is, arrays and objects as
//! compact JSON, and every other scalar in its JSON spelling, so booleans
//! read back as lowercase `true`/`false` rather than `True`/`False`.
//! Consumers comparing against older exports must match case-insensitively.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ListingDetail, ListingSummary};
use crate::models::{Attribution, Property, SearchConfig};

/// Prefix added to flattened attribution keys.
pub const ATTRIBUTION_PREFIX: &str = "Attribution_";

static UPPER_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z]+)").unwrap());

/// Provider keys whose field name isn't just their snake_case form.
const KNOWN_FIELDS: &[(&str, &str)] = &[
    ("agentEmail", "agent_email"),
    ("agentLicenseNumber", "agent_license_number"),
    ("agentName", "agent_name"),
    ("agentPhoneNumber", "agent_phone_number"),
    ("attributionTitle", "title"),
    ("brokerName", "broker_name"),
    ("brokerPhoneNumber", "broker_phone_number"),
    ("buyerAgentMemberStateLicense", "buyer_agent_member_state_license"),
    ("buyerAgentName", "buyer_agent_name"),
    ("buyerBrokerageName", "buyer_brokerage_name"),
    ("coAgentLicenseNumber", "co_agent_license_number"),
    ("coAgentName", "co_agent_name"),
    ("coAgentNumber", "co_agent_number"),
    ("lastChecked", "last_checked"),
    ("lastUpdated", "last_updated"),
    ("listingOffices", "listing_offices"),
    ("listingAgents", "listing_agents"),
    ("mlsDisclaimer", "mls_disclaimer"),
    ("mlsId", "mls_id"),
    ("mlsName", "mls_name"),
    ("providerLogo", "provider_logo"),
    ("listingAgreement", "listing_agreement"),
    ("listingAttributionContact", "listing_attribution_contact"),
    ("listingAgentAttributionContact", "listing_agent_attribution_contact"),
    ("infoString3", "info_string3"),
    ("infoString5", "info_string5"),
    ("infoString10", "info_string10"),
    ("infoString16", "info_string16"),
    ("trueStatus", "true_status"),
];

/// camelCase to snake_case: every run of capitals gets a leading underscore.
pub fn to_snake_case(key: &str) -> String {
    let snake = UPPER_RUN.replace_all(key, "_$1").to_lowercase();
    snake.strip_prefix('_').map(str::to_string).unwrap_or(snake)
}

/// Resolve a provider key (with or without the flattening prefix) to a field name.
pub fn resolve_field_name(key: &str) -> String {
    let key = key.strip_prefix(ATTRIBUTION_PREFIX).unwrap_or(key);
    KNOWN_FIELDS
        .iter()
        .find(|(provider, _)| *provider == key)
        .map(|(_, field)| field.to_string())
        .unwrap_or_else(|| to_snake_case(key))
}

/// Column text for a JSON value: arrays and objects as JSON, null as none.
fn column_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Clean provider keys and add the `Attribution_` prefix.
///
/// Spaces and hyphens become underscores, parentheses are dropped.
pub fn flatten_attribution(
    raw: &serde_json::Map<String, Value>,
) -> serde_json::Map<String, Value> {
    raw.iter()
        .map(|(key, value)| {
            let clean: String = key
                .chars()
                .filter(|c| *c != '(' && *c != ')')
                .map(|c| if c == ' ' || c == '-' { '_' } else { c })
                .collect();
            (format!("{ATTRIBUTION_PREFIX}{clean}"), value.clone())
        })
        .collect()
}

/// Split flattened attribution into fixed fields and extras.
pub fn normalize_attribution(flat: &serde_json::Map<String, Value>) -> Attribution {
    let mut attribution = Attribution::default();
    for (key, value) in flat {
        let field = resolve_field_name(key);
        match attribution.field_mut(&field) {
            Some(slot) => *slot = column_text(value),
            None => {
                let bare = key.strip_prefix(ATTRIBUTION_PREFIX).unwrap_or(key);
                attribution.extra.insert(bare.to_string(), value.clone());
            }
        }
    }
    attribution
}

/// Build the persisted record for one fetched listing.
///
/// Summary fields win over detail fields; bounds come from the config.
pub fn normalize_listing(
    config: &SearchConfig,
    summary: &ListingSummary,
    detail: &ListingDetail,
) -> Property {
    let mut property = Property::new(config.search_value.clone(), summary.address.clone());
    if property.address.is_empty() {
        property.address = detail.address.clone().unwrap_or_default();
    }
    property.price = summary.price.clone().or_else(|| detail.price.clone());
    property.sold_by = summary.status.clone().or_else(|| detail.status.clone());
    property.url = detail.url.clone().or_else(|| Some(summary.locator.clone()));
    property.bounds = Some(config.bounds);
    property.attribution = normalize_attribution(&flatten_attribution(&detail.attribution));
    property
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use serde_json::json;

    fn map(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("agentName"), "agent_name");
        assert_eq!(to_snake_case("MLSId"), "mlsid");
        assert_eq!(to_snake_case("infoString3"), "info_string3");
        assert_eq!(to_snake_case("plain"), "plain");
    }

    #[test]
    fn test_resolve_field_name() {
        assert_eq!(resolve_field_name("Attribution_attributionTitle"), "title");
        assert_eq!(resolve_field_name("agentEmail"), "agent_email");
        assert_eq!(resolve_field_name("Attribution_openHouseTime"), "open_house_time");
    }

    #[test]
    fn test_unknown_key_goes_to_extra() {
        let attribution = normalize_attribution(&map(json!({
            "Attribution_agentName": "Jane Doe",
            "Attribution_openHouseTime": "Sat 1-4",
        })));
        assert_eq!(attribution.agent_name.as_deref(), Some("Jane Doe"));
        assert_eq!(attribution.extra.get("openHouseTime"), Some(&json!("Sat 1-4")));
        assert_eq!(attribution.extra.len(), 1);
    }

    #[test]
    fn test_unmapped_key_matching_fixed_field_is_stored_there() {
        // Not in the alias table, but derives to a fixed field name
        let attribution = normalize_attribution(&map(json!({ "Attribution_title": "Listed by" })));
        assert_eq!(attribution.title.as_deref(), Some("Listed by"));
        assert!(attribution.extra.is_empty());
    }

    #[test]
    fn test_value_encoding() {
        let attribution = normalize_attribution(&map(json!({
            "Attribution_listingAgents": [{"memberFullName": "A"}],
            "Attribution_mlsId": 12345,
            "Attribution_agentEmail": null,
            "Attribution_trueStatus": false,
            "Attribution_mlsName": true,
        })));
        assert_eq!(
            attribution.listing_agents.as_deref(),
            Some(r#"[{"memberFullName":"A"}]"#)
        );
        assert_eq!(attribution.mls_id.as_deref(), Some("12345"));
        assert_eq!(attribution.agent_email, None);
        assert_eq!(attribution.true_status.as_deref(), Some("false"));
        assert_eq!(attribution.mls_name.as_deref(), Some("true"));
    }

    #[test]
    fn test_flatten_cleans_keys() {
        let flat = flatten_attribution(&map(json!({ "info (extra)-key name": 1 })));
        assert!(flat.contains_key("Attribution_info_extra_key_name"));
    }

    #[test]
    fn test_normalize_listing() {
        let config = SearchConfig::new("San Diego", BoundingBox::new(32.9, -117.0, 32.6, -117.3), 1);
        let summary = ListingSummary {
            address: "1 Main St".to_string(),
            price: Some("$500,000".to_string()),
            status: Some("FOR_SALE".to_string()),
            locator: "/homedetails/1".to_string(),
        };
        let detail = ListingDetail {
            url: Some("https://listings.example/homedetails/1".to_string()),
            attribution: map(json!({ "agentPhoneNumber": "619-555-0100" })),
            ..Default::default()
        };

        let property = normalize_listing(&config, &summary, &detail);
        assert_eq!(property.search_term, "San Diego");
        assert_eq!(property.sold_by.as_deref(), Some("FOR_SALE"));
        assert_eq!(property.bounds, Some(config.bounds));
        assert_eq!(
            property.attribution.agent_phone_number.as_deref(),
            Some("619-555-0100")
        );
    }
}
