//! Diesel database context for managing the connection pool and repository access.

use std::path::Path;

use diesel_async::{RunQueryDsl, SimpleAsyncConnection};

use super::diesel_execution_log::DieselExecutionLogRepository;
use super::diesel_message_template::DieselMessageTemplateRepository;
use super::diesel_property::DieselPropertyRepository;
use super::diesel_scheduler_config::DieselSchedulerConfigRepository;
use super::diesel_search_config::DieselSearchConfigRepository;
use super::pool::{DbPool, DieselError};
use crate::with_conn;

/// Entry point for database operations.
///
/// Create one context per command or service, then use it to access all
/// repositories.
///
/// # Example
/// ```ignore
/// let ctx = DieselDbContext::from_url(&settings.database_url());
/// ctx.init_schema().await?;
/// let configs = ctx.search_configs().list_active().await?;
/// ```
#[derive(Clone, Debug)]
pub struct DieselDbContext {
    pool: DbPool,
}

impl DieselDbContext {
    /// Create a new database context from a file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: DbPool::from_path(db_path),
        }
    }

    /// Create a new database context from a database URL (`sqlite:` prefix optional).
    pub fn from_url(database_url: &str) -> Self {
        Self {
            pool: DbPool::new(database_url),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a search configuration repository.
    pub fn search_configs(&self) -> DieselSearchConfigRepository {
        DieselSearchConfigRepository::new(self.pool.clone())
    }

    /// Get a property repository.
    pub fn properties(&self) -> DieselPropertyRepository {
        DieselPropertyRepository::new(self.pool.clone())
    }

    /// Get an execution log repository.
    pub fn execution_logs(&self) -> DieselExecutionLogRepository {
        DieselExecutionLogRepository::new(self.pool.clone())
    }

    /// Get the scheduler configuration repository.
    pub fn scheduler_config(&self) -> DieselSchedulerConfigRepository {
        DieselSchedulerConfigRepository::new(self.pool.clone())
    }

    /// Get a message template repository.
    pub fn message_templates(&self) -> DieselMessageTemplateRepository {
        DieselMessageTemplateRepository::new(self.pool.clone())
    }

    /// Initialize all database schemas.
    ///
    /// This creates the necessary tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        with_conn!(self.pool, conn => {
            conn.batch_execute(
                r#"
                -- Search configurations
                CREATE TABLE IF NOT EXISTS search_configs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    search_value TEXT NOT NULL UNIQUE,
                    ne_lat REAL NOT NULL,
                    ne_long REAL NOT NULL,
                    sw_lat REAL NOT NULL,
                    sw_long REAL NOT NULL,
                    pagination INTEGER NOT NULL DEFAULT 1,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    description TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- Scraped properties, replaced per search term on every run
                CREATE TABLE IF NOT EXISTS properties (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    search_term TEXT NOT NULL,
                    address TEXT NOT NULL,
                    price TEXT,
                    sold_by TEXT,
                    url TEXT,
                    ne_lat REAL,
                    ne_long REAL,
                    sw_lat REAL,
                    sw_long REAL,
                    attribution_agent_email TEXT,
                    attribution_agent_license_number TEXT,
                    attribution_agent_name TEXT,
                    attribution_agent_phone_number TEXT,
                    attribution_title TEXT,
                    attribution_broker_name TEXT,
                    attribution_broker_phone_number TEXT,
                    attribution_buyer_agent_member_state_license TEXT,
                    attribution_buyer_agent_name TEXT,
                    attribution_buyer_brokerage_name TEXT,
                    attribution_co_agent_license_number TEXT,
                    attribution_co_agent_name TEXT,
                    attribution_co_agent_number TEXT,
                    attribution_last_checked TEXT,
                    attribution_last_updated TEXT,
                    attribution_listing_offices TEXT,
                    attribution_listing_agents TEXT,
                    attribution_mls_disclaimer TEXT,
                    attribution_mls_id TEXT,
                    attribution_mls_name TEXT,
                    attribution_provider_logo TEXT,
                    attribution_listing_agreement TEXT,
                    attribution_listing_attribution_contact TEXT,
                    attribution_listing_agent_attribution_contact TEXT,
                    attribution_info_string3 TEXT,
                    attribution_info_string5 TEXT,
                    attribution_info_string10 TEXT,
                    attribution_info_string16 TEXT,
                    attribution_true_status TEXT,
                    attribution_extra TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- Execution audit log
                CREATE TABLE IF NOT EXISTS scraper_logs (
                    execution_id TEXT PRIMARY KEY,
                    status TEXT NOT NULL DEFAULT 'running',
                    start_time TEXT NOT NULL,
                    end_time TEXT,
                    total_searches INTEGER NOT NULL DEFAULT 0,
                    successful_searches INTEGER NOT NULL DEFAULT 0,
                    total_properties INTEGER NOT NULL DEFAULT 0,
                    properties_saved INTEGER NOT NULL DEFAULT 0,
                    error_message TEXT,
                    error_details TEXT,
                    log_file_path TEXT,
                    heartbeat_at TEXT
                );

                -- Scheduler configuration (single row)
                CREATE TABLE IF NOT EXISTS scraper_config (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    is_enabled INTEGER NOT NULL DEFAULT 1,
                    schedule_interval_minutes INTEGER NOT NULL DEFAULT 10,
                    last_scheduled_run TEXT,
                    next_scheduled_run TEXT,
                    max_concurrent_workers INTEGER NOT NULL DEFAULT 5,
                    timeout_minutes INTEGER NOT NULL DEFAULT 5,
                    retry_attempts INTEGER NOT NULL DEFAULT 3,
                    updated_at TEXT NOT NULL
                );

                -- SMS message templates
                CREATE TABLE IF NOT EXISTS message_templates (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    body TEXT NOT NULL,
                    is_default INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- Indexes
                CREATE INDEX IF NOT EXISTS idx_properties_search_term ON properties(search_term);
                CREATE INDEX IF NOT EXISTS idx_scraper_logs_start ON scraper_logs(start_time);
                CREATE INDEX IF NOT EXISTS idx_scraper_logs_status ON scraper_logs(status);
                "#,
            )
            .await?;

            // Databases created before heartbeats were tracked
            let columns: Vec<NameRow> =
                diesel::sql_query("SELECT name FROM pragma_table_info('scraper_logs')")
                    .load(&mut conn)
                    .await?;
            if !columns.iter().any(|c| c.name == "heartbeat_at") {
                conn.batch_execute(
                    "ALTER TABLE scraper_logs ADD COLUMN heartbeat_at TEXT;
                     UPDATE scraper_logs SET heartbeat_at = start_time WHERE heartbeat_at IS NULL;",
                )
                .await?;
            }
            Ok(())
        })
    }

    /// Get list of all tables in the database.
    pub async fn list_tables(&self) -> Result<Vec<String>, DieselError> {
        with_conn!(self.pool, conn => {
            let rows: Vec<NameRow> = diesel::sql_query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .load(&mut conn)
            .await?;
            Ok(rows.into_iter().map(|r| r.name).collect())
        })
    }
}

#[derive(diesel::QueryableByName)]
struct NameRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}
