//! Shared helper functions for CLI commands.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::config::Settings;
use crate::repository::DieselDbContext;
use crate::scrapers::HttpListingSource;
use crate::services::{RunExecutor, Scheduler};

/// Open the database, creating directories and tables on first use.
pub async fn open_db(settings: &Settings) -> anyhow::Result<DieselDbContext> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;
    Ok(ctx)
}

/// Wire the HTTP source and run executor into a scheduler.
pub fn build_scheduler(settings: &Settings, ctx: DieselDbContext) -> anyhow::Result<Scheduler> {
    let source = HttpListingSource::new(&settings.source_config())?;
    let executor = RunExecutor::new(ctx.clone(), Arc::new(source), settings.executor_options());
    Ok(Scheduler::new(ctx, Arc::new(executor), settings.poll_interval()))
}

/// Truncate to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Local-time rendering for tables; "Never" when unset.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Never".to_string())
}
