//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against a single SQLite file.

pub mod diesel_context;
pub mod diesel_execution_log;
pub mod diesel_message_template;
pub mod diesel_models;
pub mod diesel_property;
pub mod diesel_scheduler_config;
pub mod diesel_search_config;
pub mod pool;
pub mod util;

pub use diesel_context::DieselDbContext;
pub use diesel_execution_log::DieselExecutionLogRepository;
pub use diesel_message_template::DieselMessageTemplateRepository;
pub use diesel_property::DieselPropertyRepository;
pub use diesel_scheduler_config::DieselSchedulerConfigRepository;
pub use diesel_search_config::DieselSearchConfigRepository;
pub use pool::{DbPool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::DieselDbContext;
    use tempfile::TempDir;

    /// Fresh database with schema applied. Keep the `TempDir` alive.
    pub async fn setup_test_db() -> (DieselDbContext, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DieselDbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx, dir)
    }
}
