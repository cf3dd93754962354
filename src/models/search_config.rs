//! Search configuration models.
//!
//! A search configuration is one scraping target: a search term plus the
//! geographic box the provider should be queried with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic bounding box, north-east and south-west corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub ne_lat: f64,
    pub ne_long: f64,
    pub sw_lat: f64,
    pub sw_long: f64,
}

impl BoundingBox {
    pub fn new(ne_lat: f64, ne_long: f64, sw_lat: f64, sw_long: f64) -> Self {
        Self {
            ne_lat,
            ne_long,
            sw_lat,
            sw_long,
        }
    }

    /// Check that the corners are ordered and within lat/long ranges.
    pub fn is_valid(&self) -> bool {
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let long_ok = |v: f64| (-180.0..=180.0).contains(&v);
        lat_ok(self.ne_lat)
            && lat_ok(self.sw_lat)
            && long_ok(self.ne_long)
            && long_ok(self.sw_long)
            && self.ne_lat >= self.sw_lat
            && self.ne_long >= self.sw_long
    }
}

/// A saved geographic + keyword query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Database row ID (0 until persisted).
    pub id: i32,
    /// Unique search term. Properties reference configs by this value.
    pub search_value: String,
    pub bounds: BoundingBox,
    /// Number of result pages to request from the provider.
    pub pagination: u32,
    /// Only active configs are picked up by scheduled runs.
    pub is_active: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchConfig {
    /// Create a new, active search configuration.
    pub fn new(search_value: impl Into<String>, bounds: BoundingBox, pagination: u32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            search_value: search_value.into(),
            bounds,
            pagination: pagination.max(1),
            is_active: true,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = SearchConfig::new("Homes in San Diego", BoundingBox::new(32.8, -117.0, 32.7, -117.1), 0);
        assert_eq!(config.pagination, 1);
        assert!(config.is_active);
        assert!(config.description.is_empty());
    }

    #[test]
    fn test_bounding_box_validation() {
        assert!(BoundingBox::new(32.8, -117.0, 32.7, -117.1).is_valid());
        // Corners swapped
        assert!(!BoundingBox::new(32.7, -117.1, 32.8, -117.0).is_valid());
        // Out of range
        assert!(!BoundingBox::new(95.0, -117.0, 32.7, -117.1).is_valid());
    }
}
