//! Diesel-based scheduler configuration repository.
//!
//! The table holds a single row with `id = 1`, created with defaults on
//! first access.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{NewSchedulerConfig, SchedulerConfigRecord};
use super::pool::{DbPool, DieselError};
use super::util::{flag, from_db_count, to_db_count};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::SchedulerSettings;
use crate::schema::scraper_config;
use crate::with_conn;

const SINGLETON_ID: i32 = 1;

/// Convert a database record to a domain model.
impl From<SchedulerConfigRecord> for SchedulerSettings {
    fn from(record: SchedulerConfigRecord) -> Self {
        SchedulerSettings {
            is_enabled: record.is_enabled != 0,
            schedule_interval_minutes: from_db_count(record.schedule_interval_minutes),
            last_scheduled_run: parse_datetime_opt(record.last_scheduled_run),
            next_scheduled_run: parse_datetime_opt(record.next_scheduled_run),
            max_concurrent_workers: from_db_count(record.max_concurrent_workers).max(1),
            timeout_minutes: from_db_count(record.timeout_minutes),
            retry_attempts: from_db_count(record.retry_attempts),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Scheduler configuration storage.
#[derive(Clone)]
pub struct DieselSchedulerConfigRepository {
    pool: DbPool,
}

impl DieselSchedulerConfigRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load the configuration, inserting the defaults if the row is missing.
    pub async fn get_or_create(&self) -> Result<SchedulerSettings, DieselError> {
        let defaults = SchedulerSettings::default();
        let updated_at = defaults.updated_at.to_rfc3339();

        with_conn!(self.pool, conn => {
            diesel::insert_or_ignore_into(scraper_config::table)
                .values(&NewSchedulerConfig {
                    id: SINGLETON_ID,
                    is_enabled: flag(defaults.is_enabled),
                    schedule_interval_minutes: to_db_count(defaults.schedule_interval_minutes),
                    last_scheduled_run: None,
                    next_scheduled_run: None,
                    max_concurrent_workers: to_db_count(defaults.max_concurrent_workers),
                    timeout_minutes: to_db_count(defaults.timeout_minutes),
                    retry_attempts: to_db_count(defaults.retry_attempts),
                    updated_at: &updated_at,
                })
                .execute(&mut conn)
                .await?;

            scraper_config::table
                .find(SINGLETON_ID)
                .select(SchedulerConfigRecord::as_select())
                .first::<SchedulerConfigRecord>(&mut conn)
                .await
                .map(SchedulerSettings::from)
        })
    }

    /// Overwrite the configuration row.
    pub async fn save(&self, settings: &SchedulerSettings) -> Result<(), DieselError> {
        let last = settings.last_scheduled_run.map(|t| t.to_rfc3339());
        let next = settings.next_scheduled_run.map(|t| t.to_rfc3339());
        let updated_at = settings.updated_at.to_rfc3339();

        with_conn!(self.pool, conn => {
            diesel::replace_into(scraper_config::table)
                .values(&NewSchedulerConfig {
                    id: SINGLETON_ID,
                    is_enabled: flag(settings.is_enabled),
                    schedule_interval_minutes: to_db_count(settings.schedule_interval_minutes),
                    last_scheduled_run: last.as_deref(),
                    next_scheduled_run: next.as_deref(),
                    max_concurrent_workers: to_db_count(settings.max_concurrent_workers),
                    timeout_minutes: to_db_count(settings.timeout_minutes),
                    retry_attempts: to_db_count(settings.retry_attempts),
                    updated_at: &updated_at,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Record run timestamps without touching the tunables.
    pub async fn set_run_times(
        &self,
        last: Option<DateTime<Utc>>,
        next: Option<DateTime<Utc>>,
    ) -> Result<(), DieselError> {
        let last = last.map(|t| t.to_rfc3339());
        let next = next.map(|t| t.to_rfc3339());

        with_conn!(self.pool, conn => {
            diesel::update(scraper_config::table.find(SINGLETON_ID))
                .set((
                    scraper_config::last_scheduled_run.eq(last.as_deref()),
                    scraper_config::next_scheduled_run.eq(next.as_deref()),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;

    #[tokio::test]
    async fn test_defaults_created_once() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.scheduler_config();

        let first = repo.get_or_create().await.unwrap();
        assert!(first.is_enabled);
        assert_eq!(first.schedule_interval_minutes, 10);
        assert_eq!(first.retry_attempts, 3);

        let mut changed = first.clone();
        changed.schedule_interval_minutes = 45;
        repo.save(&changed).await.unwrap();

        // A second get_or_create must not reset to defaults
        let again = repo.get_or_create().await.unwrap();
        assert_eq!(again.schedule_interval_minutes, 45);
    }

    #[tokio::test]
    async fn test_set_run_times() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.scheduler_config();
        repo.get_or_create().await.unwrap();

        let last = Utc::now();
        let next = last + chrono::Duration::minutes(10);
        repo.set_run_times(Some(last), Some(next)).await.unwrap();

        let settings = repo.get_or_create().await.unwrap();
        assert_eq!(
            settings.next_scheduled_run.map(|t| t.timestamp()),
            Some(next.timestamp())
        );
        assert_eq!(settings.timeout_minutes, 5);
    }
}
