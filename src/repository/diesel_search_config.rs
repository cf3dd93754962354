//! Diesel-based search configuration repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{NewSearchConfig, SearchConfigRecord};
use super::parse_datetime;
use super::pool::{DbPool, DieselError};
use super::util::flag;
use crate::models::{BoundingBox, SearchConfig};
use crate::schema::search_configs;
use crate::with_conn;

/// Convert a database record to a domain model.
impl From<SearchConfigRecord> for SearchConfig {
    fn from(record: SearchConfigRecord) -> Self {
        SearchConfig {
            id: record.id,
            search_value: record.search_value,
            bounds: BoundingBox::new(record.ne_lat, record.ne_long, record.sw_lat, record.sw_long),
            pagination: u32::try_from(record.pagination).unwrap_or(1).max(1),
            is_active: record.is_active != 0,
            description: record.description,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Search configuration storage, keyed by the unique search value.
#[derive(Clone)]
pub struct DieselSearchConfigRepository {
    pool: DbPool,
}

impl DieselSearchConfigRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get all active configurations, oldest first.
    pub async fn list_active(&self) -> Result<Vec<SearchConfig>, DieselError> {
        with_conn!(self.pool, conn => {
            search_configs::table
                .filter(search_configs::is_active.eq(1))
                .order(search_configs::id.asc())
                .select(SearchConfigRecord::as_select())
                .load::<SearchConfigRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(SearchConfig::from).collect())
        })
    }

    /// Get all configurations, active or not.
    pub async fn list_all(&self) -> Result<Vec<SearchConfig>, DieselError> {
        with_conn!(self.pool, conn => {
            search_configs::table
                .order(search_configs::id.asc())
                .select(SearchConfigRecord::as_select())
                .load::<SearchConfigRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(SearchConfig::from).collect())
        })
    }

    /// Get a configuration by its search value.
    pub async fn get_by_value(&self, search_value: &str) -> Result<Option<SearchConfig>, DieselError> {
        with_conn!(self.pool, conn => {
            search_configs::table
                .filter(search_configs::search_value.eq(search_value))
                .select(SearchConfigRecord::as_select())
                .first::<SearchConfigRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(SearchConfig::from))
        })
    }

    /// Insert a configuration, or update the one with the same search value.
    ///
    /// `created_at` is kept from the existing row on update.
    pub async fn upsert(&self, config: &SearchConfig) -> Result<SearchConfig, DieselError> {
        let now = Utc::now().to_rfc3339();
        let created_at = config.created_at.to_rfc3339();
        let pagination = i32::try_from(config.pagination.max(1)).unwrap_or(i32::MAX);
        let is_active = flag(config.is_active);

        with_conn!(self.pool, conn => {
            diesel::insert_into(search_configs::table)
                .values(&NewSearchConfig {
                    search_value: &config.search_value,
                    ne_lat: config.bounds.ne_lat,
                    ne_long: config.bounds.ne_long,
                    sw_lat: config.bounds.sw_lat,
                    sw_long: config.bounds.sw_long,
                    pagination,
                    is_active,
                    description: &config.description,
                    created_at: &created_at,
                    updated_at: &now,
                })
                .on_conflict(search_configs::search_value)
                .do_update()
                .set((
                    search_configs::ne_lat.eq(config.bounds.ne_lat),
                    search_configs::ne_long.eq(config.bounds.ne_long),
                    search_configs::sw_lat.eq(config.bounds.sw_lat),
                    search_configs::sw_long.eq(config.bounds.sw_long),
                    search_configs::pagination.eq(pagination),
                    search_configs::is_active.eq(is_active),
                    search_configs::description.eq(&config.description),
                    search_configs::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

            search_configs::table
                .filter(search_configs::search_value.eq(&config.search_value))
                .select(SearchConfigRecord::as_select())
                .first::<SearchConfigRecord>(&mut conn)
                .await
                .map(SearchConfig::from)
        })
    }

    /// Delete a configuration. Returns false when nothing matched.
    pub async fn delete(&self, search_value: &str) -> Result<bool, DieselError> {
        with_conn!(self.pool, conn => {
            let rows = diesel::delete(
                search_configs::table.filter(search_configs::search_value.eq(search_value)),
            )
            .execute(&mut conn)
            .await?;
            Ok(rows > 0)
        })
    }

    /// Activate or deactivate a configuration. Returns false when nothing matched.
    pub async fn set_active(&self, search_value: &str, active: bool) -> Result<bool, DieselError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            let rows = diesel::update(
                search_configs::table.filter(search_configs::search_value.eq(search_value)),
            )
            .set((
                search_configs::is_active.eq(flag(active)),
                search_configs::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
            Ok(rows > 0)
        })
    }
}
