//! Property models.
//!
//! A property is one normalized listing as persisted for a search term.
//! Attribution data arrives schema-less from the provider; the fields we
//! know about get their own column, everything else lands in `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::search_config::BoundingBox;

/// Fixed attribution fields, in column order.
pub const ATTRIBUTION_FIELDS: [&str; 29] = [
    "agent_email",
    "agent_license_number",
    "agent_name",
    "agent_phone_number",
    "title",
    "broker_name",
    "broker_phone_number",
    "buyer_agent_member_state_license",
    "buyer_agent_name",
    "buyer_brokerage_name",
    "co_agent_license_number",
    "co_agent_name",
    "co_agent_number",
    "last_checked",
    "last_updated",
    "listing_offices",
    "listing_agents",
    "mls_disclaimer",
    "mls_id",
    "mls_name",
    "provider_logo",
    "listing_agreement",
    "listing_attribution_contact",
    "listing_agent_attribution_contact",
    "info_string3",
    "info_string5",
    "info_string10",
    "info_string16",
    "true_status",
];

/// Listing attribution: who listed it, who brokers it, which MLS it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub agent_email: Option<String>,
    pub agent_license_number: Option<String>,
    pub agent_name: Option<String>,
    pub agent_phone_number: Option<String>,
    pub title: Option<String>,
    pub broker_name: Option<String>,
    pub broker_phone_number: Option<String>,
    pub buyer_agent_member_state_license: Option<String>,
    pub buyer_agent_name: Option<String>,
    pub buyer_brokerage_name: Option<String>,
    pub co_agent_license_number: Option<String>,
    pub co_agent_name: Option<String>,
    pub co_agent_number: Option<String>,
    pub last_checked: Option<String>,
    pub last_updated: Option<String>,
    pub listing_offices: Option<String>,
    pub listing_agents: Option<String>,
    pub mls_disclaimer: Option<String>,
    pub mls_id: Option<String>,
    pub mls_name: Option<String>,
    pub provider_logo: Option<String>,
    pub listing_agreement: Option<String>,
    pub listing_attribution_contact: Option<String>,
    pub listing_agent_attribution_contact: Option<String>,
    pub info_string3: Option<String>,
    pub info_string5: Option<String>,
    pub info_string10: Option<String>,
    pub info_string16: Option<String>,
    pub true_status: Option<String>,
    /// Provider keys with no fixed column, keyed by the un-prefixed name.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Attribution {
    /// Mutable access to a fixed field by its snake_case name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        let slot = match name {
            "agent_email" => &mut self.agent_email,
            "agent_license_number" => &mut self.agent_license_number,
            "agent_name" => &mut self.agent_name,
            "agent_phone_number" => &mut self.agent_phone_number,
            "title" => &mut self.title,
            "broker_name" => &mut self.broker_name,
            "broker_phone_number" => &mut self.broker_phone_number,
            "buyer_agent_member_state_license" => &mut self.buyer_agent_member_state_license,
            "buyer_agent_name" => &mut self.buyer_agent_name,
            "buyer_brokerage_name" => &mut self.buyer_brokerage_name,
            "co_agent_license_number" => &mut self.co_agent_license_number,
            "co_agent_name" => &mut self.co_agent_name,
            "co_agent_number" => &mut self.co_agent_number,
            "last_checked" => &mut self.last_checked,
            "last_updated" => &mut self.last_updated,
            "listing_offices" => &mut self.listing_offices,
            "listing_agents" => &mut self.listing_agents,
            "mls_disclaimer" => &mut self.mls_disclaimer,
            "mls_id" => &mut self.mls_id,
            "mls_name" => &mut self.mls_name,
            "provider_logo" => &mut self.provider_logo,
            "listing_agreement" => &mut self.listing_agreement,
            "listing_attribution_contact" => &mut self.listing_attribution_contact,
            "listing_agent_attribution_contact" => &mut self.listing_agent_attribution_contact,
            "info_string3" => &mut self.info_string3,
            "info_string5" => &mut self.info_string5,
            "info_string10" => &mut self.info_string10,
            "info_string16" => &mut self.info_string16,
            "true_status" => &mut self.true_status,
            _ => return None,
        };
        Some(slot)
    }

    /// Extra map as JSON text, `None` when empty.
    pub fn extra_json(&self) -> Option<String> {
        if self.extra.is_empty() {
            None
        } else {
            serde_json::to_string(&self.extra).ok()
        }
    }
}

/// A persisted listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Database row ID (`None` until persisted).
    pub id: Option<i32>,
    /// Search value of the config this record was fetched for.
    pub search_term: String,
    pub address: String,
    pub price: Option<String>,
    /// Listing status text, e.g. "FOR_SALE" or "SOLD".
    pub sold_by: Option<String>,
    pub url: Option<String>,
    /// Bounds of the config at fetch time.
    pub bounds: Option<BoundingBox>,
    pub attribution: Attribution,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn new(search_term: impl Into<String>, address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            search_term: search_term.into(),
            address: address.into(),
            price: None,
            sold_by: None,
            url: None,
            bounds: None,
            attribution: Attribution::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_fixed_field_is_addressable() {
        let mut attribution = Attribution::default();
        for name in ATTRIBUTION_FIELDS {
            let slot = attribution.field_mut(name);
            assert!(slot.is_some(), "{} has no slot", name);
            *slot.unwrap() = Some(name.to_string());
        }
        assert_eq!(attribution.agent_email.as_deref(), Some("agent_email"));
        assert_eq!(attribution.true_status.as_deref(), Some("true_status"));
        assert!(attribution.field_mut("favorite_color").is_none());
    }

    #[test]
    fn test_extra_json_empty_is_none() {
        let mut attribution = Attribution::default();
        assert_eq!(attribution.extra_json(), None);

        attribution
            .extra
            .insert("openHouse".to_string(), serde_json::json!("Sat 1-4"));
        assert_eq!(
            attribution.extra_json().as_deref(),
            Some(r#"{"openHouse":"Sat 1-4"}"#)
        );
    }
}
