//! Foreground run command.

use chrono::Utc;
use console::style;

use crate::config::Settings;
use crate::models::{stale_before, ExecutionStatus};
use crate::services::SchedulerError;

use super::helpers::{build_scheduler, open_db};

/// Run the scraper once and print the totals.
///
/// A `running` log with a fresh heartbeat means another process is
/// mid-run, which is reported as already running.
pub async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;

    let live = ctx.execution_logs().list_live(stale_before(Utc::now())).await?;
    if let Some(other) = live.first() {
        println!(
            "{} Run {} is still active in another process",
            style("!").yellow(),
            other.execution_id
        );
        return Err(SchedulerError::AlreadyRunning.into());
    }

    let scheduler = build_scheduler(settings, ctx)?;
    println!("{} Starting scraper run", style("→").cyan());
    let summary = scheduler.run_now().await?;
    let counters = summary.counters;
    if summary.status != ExecutionStatus::Completed {
        println!(
            "{} Run {} was recorded as {}",
            style("!").yellow(),
            summary.execution_id,
            summary.status.as_str()
        );
    }

    println!(
        "{} Run {} {} in {:.1}s",
        style("✓").green(),
        summary.execution_id,
        summary.status.as_str(),
        summary.duration.as_secs_f64()
    );
    println!(
        "  Searches:   {}/{} successful",
        counters.successful_searches, counters.total_searches
    );
    println!(
        "  Properties: {} saved of {} fetched",
        counters.properties_saved, counters.total_properties
    );
    if counters.successful_searches < counters.total_searches {
        println!(
            "{} Some searches failed; see 'scout logs show {}'",
            style("!").yellow(),
            summary.execution_id
        );
    }
    Ok(())
}
