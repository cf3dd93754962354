//! Diesel-based property repository.
//!
//! Records for a search term are only ever written as a full set: the old
//! set is deleted and the new one inserted inside one transaction.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{NewProperty, PropertyRecord};
use super::parse_datetime;
use super::pool::{DbPool, DieselError};
use crate::models::{Attribution, BoundingBox, Property};
use crate::schema::properties;
use crate::with_conn;

/// Convert a database record to a domain model.
impl From<PropertyRecord> for Property {
    fn from(record: PropertyRecord) -> Self {
        let bounds = match (record.ne_lat, record.ne_long, record.sw_lat, record.sw_long) {
            (Some(ne_lat), Some(ne_long), Some(sw_lat), Some(sw_long)) => {
                Some(BoundingBox::new(ne_lat, ne_long, sw_lat, sw_long))
            }
            _ => None,
        };
        let extra = record
            .attribution_extra
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Property {
            id: Some(record.id),
            search_term: record.search_term,
            address: record.address,
            price: record.price,
            sold_by: record.sold_by,
            url: record.url,
            bounds,
            attribution: Attribution {
                agent_email: record.attribution_agent_email,
                agent_license_number: record.attribution_agent_license_number,
                agent_name: record.attribution_agent_name,
                agent_phone_number: record.attribution_agent_phone_number,
                title: record.attribution_title,
                broker_name: record.attribution_broker_name,
                broker_phone_number: record.attribution_broker_phone_number,
                buyer_agent_member_state_license: record.attribution_buyer_agent_member_state_license,
                buyer_agent_name: record.attribution_buyer_agent_name,
                buyer_brokerage_name: record.attribution_buyer_brokerage_name,
                co_agent_license_number: record.attribution_co_agent_license_number,
                co_agent_name: record.attribution_co_agent_name,
                co_agent_number: record.attribution_co_agent_number,
                last_checked: record.attribution_last_checked,
                last_updated: record.attribution_last_updated,
                listing_offices: record.attribution_listing_offices,
                listing_agents: record.attribution_listing_agents,
                mls_disclaimer: record.attribution_mls_disclaimer,
                mls_id: record.attribution_mls_id,
                mls_name: record.attribution_mls_name,
                provider_logo: record.attribution_provider_logo,
                listing_agreement: record.attribution_listing_agreement,
                listing_attribution_contact: record.attribution_listing_attribution_contact,
                listing_agent_attribution_contact: record
                    .attribution_listing_agent_attribution_contact,
                info_string3: record.attribution_info_string3,
                info_string5: record.attribution_info_string5,
                info_string10: record.attribution_info_string10,
                info_string16: record.attribution_info_string16,
                true_status: record.attribution_true_status,
                extra,
            },
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Owned column values that `NewProperty` borrows from.
struct PreparedRow<'p> {
    property: &'p Property,
    extra: Option<String>,
}

impl<'p> PreparedRow<'p> {
    fn new(property: &'p Property) -> Self {
        Self {
            property,
            extra: property.attribution.extra_json(),
        }
    }

    fn as_insert<'a>(&'a self, search_term: &'a str, now: &'a str) -> NewProperty<'a> {
        let p = self.property;
        let a = &p.attribution;
        NewProperty {
            search_term,
            address: &p.address,
            price: p.price.as_deref(),
            sold_by: p.sold_by.as_deref(),
            url: p.url.as_deref(),
            ne_lat: p.bounds.map(|b| b.ne_lat),
            ne_long: p.bounds.map(|b| b.ne_long),
            sw_lat: p.bounds.map(|b| b.sw_lat),
            sw_long: p.bounds.map(|b| b.sw_long),
            attribution_agent_email: a.agent_email.as_deref(),
            attribution_agent_license_number: a.agent_license_number.as_deref(),
            attribution_agent_name: a.agent_name.as_deref(),
            attribution_agent_phone_number: a.agent_phone_number.as_deref(),
            attribution_title: a.title.as_deref(),
            attribution_broker_name: a.broker_name.as_deref(),
            attribution_broker_phone_number: a.broker_phone_number.as_deref(),
            attribution_buyer_agent_member_state_license: a
                .buyer_agent_member_state_license
                .as_deref(),
            attribution_buyer_agent_name: a.buyer_agent_name.as_deref(),
            attribution_buyer_brokerage_name: a.buyer_brokerage_name.as_deref(),
            attribution_co_agent_license_number: a.co_agent_license_number.as_deref(),
            attribution_co_agent_name: a.co_agent_name.as_deref(),
            attribution_co_agent_number: a.co_agent_number.as_deref(),
            attribution_last_checked: a.last_checked.as_deref(),
            attribution_last_updated: a.last_updated.as_deref(),
            attribution_listing_offices: a.listing_offices.as_deref(),
            attribution_listing_agents: a.listing_agents.as_deref(),
            attribution_mls_disclaimer: a.mls_disclaimer.as_deref(),
            attribution_mls_id: a.mls_id.as_deref(),
            attribution_mls_name: a.mls_name.as_deref(),
            attribution_provider_logo: a.provider_logo.as_deref(),
            attribution_listing_agreement: a.listing_agreement.as_deref(),
            attribution_listing_attribution_contact: a.listing_attribution_contact.as_deref(),
            attribution_listing_agent_attribution_contact: a
                .listing_agent_attribution_contact
                .as_deref(),
            attribution_info_string3: a.info_string3.as_deref(),
            attribution_info_string5: a.info_string5.as_deref(),
            attribution_info_string10: a.info_string10.as_deref(),
            attribution_info_string16: a.info_string16.as_deref(),
            attribution_true_status: a.true_status.as_deref(),
            attribution_extra: self.extra.as_deref(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Property storage, grouped by search term.
#[derive(Clone)]
pub struct DieselPropertyRepository {
    pool: DbPool,
}

impl DieselPropertyRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replace every record for `search_term` with `records`.
    ///
    /// Delete and insert commit together or not at all; on error the prior
    /// set is left intact. The `search_term` argument wins over whatever the
    /// records carry. Returns the number of rows inserted.
    pub async fn replace_for_search_term(
        &self,
        search_term: &str,
        records: &[Property],
    ) -> Result<usize, DieselError> {
        let now = Utc::now().to_rfc3339();
        let prepared: Vec<PreparedRow<'_>> = records.iter().map(PreparedRow::new).collect();
        let rows: Vec<NewProperty<'_>> = prepared
            .iter()
            .map(|row| row.as_insert(search_term, &now))
            .collect();

        let mut conn = self.pool.get().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::delete(properties::table.filter(properties::search_term.eq(search_term)))
                    .execute(conn)
                    .await?;

                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_into(properties::table)
                        .values(row)
                        .execute(conn)
                        .await?;
                }
                Ok(inserted)
            })
        })
        .await
    }

    /// Get all records for a search term.
    pub async fn get_by_search_term(&self, search_term: &str) -> Result<Vec<Property>, DieselError> {
        with_conn!(self.pool, conn => {
            properties::table
                .filter(properties::search_term.eq(search_term))
                .order(properties::id.asc())
                .select(PropertyRecord::as_select())
                .load::<PropertyRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Property::from).collect())
        })
    }

    /// Get all records, newest first, optionally limited.
    pub async fn get_all(&self, limit: Option<i64>) -> Result<Vec<Property>, DieselError> {
        with_conn!(self.pool, conn => {
            let mut query = properties::table
                .order(properties::id.desc())
                .select(PropertyRecord::as_select())
                .into_boxed();
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query
                .load::<PropertyRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Property::from).collect())
        })
    }

    /// Distinct search terms that currently have records.
    pub async fn unique_search_terms(&self) -> Result<Vec<String>, DieselError> {
        with_conn!(self.pool, conn => {
            properties::table
                .select(properties::search_term)
                .distinct()
                .order(properties::search_term.asc())
                .load::<String>(&mut conn)
                .await
        })
    }

    /// Delete every record for a search term. Returns the number of rows removed.
    pub async fn delete_by_search_term(&self, search_term: &str) -> Result<usize, DieselError> {
        with_conn!(self.pool, conn => {
            diesel::delete(properties::table.filter(properties::search_term.eq(search_term)))
                .execute(&mut conn)
                .await
        })
    }

    /// Count records, optionally for one search term.
    pub async fn count(&self, search_term: Option<&str>) -> Result<i64, DieselError> {
        with_conn!(self.pool, conn => {
            let mut query = properties::table.count().into_boxed();
            if let Some(term) = search_term {
                query = query.filter(properties::search_term.eq(term));
            }
            query.get_result::<i64>(&mut conn).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;
    use diesel_async::SimpleAsyncConnection;

    fn listing(term: &str, address: &str) -> Property {
        let mut property = Property::new(term, address);
        property.price = Some("$750,000".to_string());
        property.bounds = Some(BoundingBox::new(32.9, -117.0, 32.6, -117.3));
        property.attribution.agent_name = Some("Jane Doe".to_string());
        property
            .attribution
            .extra
            .insert("openHouse".to_string(), serde_json::json!(["Sat", "Sun"]));
        property
    }

    #[tokio::test]
    async fn test_replace_replaces_whole_set() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.properties();

        let first = vec![listing("San Diego", "1 A St"), listing("San Diego", "2 B St")];
        assert_eq!(repo.replace_for_search_term("San Diego", &first).await.unwrap(), 2);

        let second = vec![listing("San Diego", "3 C St")];
        assert_eq!(repo.replace_for_search_term("San Diego", &second).await.unwrap(), 1);

        let stored = repo.get_by_search_term("San Diego").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].address, "3 C St");
        assert_eq!(stored[0].attribution.agent_name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            stored[0].attribution.extra.get("openHouse"),
            Some(&serde_json::json!(["Sat", "Sun"]))
        );
        assert_eq!(stored[0].bounds, second[0].bounds);
    }

    #[tokio::test]
    async fn test_replace_leaves_other_terms_alone() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.properties();

        repo.replace_for_search_term("Austin", &[listing("Austin", "9 Z St")])
            .await
            .unwrap();
        repo.replace_for_search_term("San Diego", &[listing("San Diego", "1 A St")])
            .await
            .unwrap();
        repo.replace_for_search_term("San Diego", &[]).await.unwrap();

        assert_eq!(repo.count(Some("Austin")).await.unwrap(), 1);
        assert_eq!(repo.count(Some("San Diego")).await.unwrap(), 0);
        assert_eq!(repo.unique_search_terms().await.unwrap(), vec!["Austin".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_delete() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.properties();

        repo.replace_for_search_term("San Diego", &[listing("San Diego", "1 A St")])
            .await
            .unwrap();

        // Reject one specific address to fail mid-batch
        let mut conn = ctx.pool().get().await.unwrap();
        conn.batch_execute(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON properties
             WHEN NEW.address = 'BAD'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .await
        .unwrap();
        drop(conn);

        let batch = vec![listing("San Diego", "2 B St"), listing("San Diego", "BAD")];
        assert!(repo.replace_for_search_term("San Diego", &batch).await.is_err());

        let stored = repo.get_by_search_term("San Diego").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].address, "1 A St");
    }

    #[tokio::test]
    async fn test_search_term_argument_wins() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.properties();

        repo.replace_for_search_term("San Diego", &[listing("elsewhere", "1 A St")])
            .await
            .unwrap();
        let all = repo.get_all(None).await.unwrap();
        assert_eq!(all[0].search_term, "San Diego");
        assert_eq!(repo.delete_by_search_term("San Diego").await.unwrap(), 1);
        assert_eq!(repo.count(None).await.unwrap(), 0);
    }
}
