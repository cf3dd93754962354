//! Scheduler commands.

use std::time::Duration;

use chrono::Utc;
use console::style;
use serde_json::json;

use crate::config::Settings;
use crate::models::{stale_before, SchedulerConfigUpdate, SchedulerSettings};
use crate::services::{ShutdownOutcome, StartOutcome};

use super::helpers::{build_scheduler, format_time, open_db};

/// How long Ctrl-C waits for an in-flight run before cancelling it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Start the scheduler in this process and block until Ctrl-C.
pub async fn cmd_scheduler_start(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let scheduler = build_scheduler(settings, ctx)?;

    if scheduler.start().await? == StartOutcome::AlreadyRunning {
        println!("{} Scheduler already running", style("!").yellow());
        return Ok(());
    }

    let status = scheduler.status().await?;
    println!(
        "{} Scheduler started (every {} minutes, next run {})",
        style("✓").green(),
        status.schedule_interval_minutes,
        format_time(status.next_scheduled_run)
    );
    if !status.is_enabled {
        println!(
            "{} Scheduled runs are disabled; enable with 'scout scheduler config --enable'",
            style("!").yellow()
        );
    }
    println!("  Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    println!("\n{} Stopping scheduler", style("→").cyan());
    if scheduler.is_run_in_flight() {
        println!(
            "  Waiting up to {}s for the current run",
            SHUTDOWN_GRACE.as_secs()
        );
    }
    match scheduler.shutdown(SHUTDOWN_GRACE).await {
        ShutdownOutcome::Idle => {}
        ShutdownOutcome::Finished => println!("{} Current run finished", style("✓").green()),
        ShutdownOutcome::Cancelled => {
            println!("{} Current run cancelled", style("!").yellow())
        }
        ShutdownOutcome::StillRunning => println!(
            "{} Current run did not stop; it will be closed out on the next start",
            style("✗").red()
        ),
    }
    Ok(())
}

/// Print persisted scheduler state and the most recent run.
pub async fn cmd_scheduler_status(settings: &Settings, as_json: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let config = ctx.scheduler_config().get_or_create().await?;
    let recent = ctx.execution_logs().list_recent(1).await?;
    let latest = recent.first();
    let in_flight = !ctx
        .execution_logs()
        .list_live(stale_before(Utc::now()))
        .await?
        .is_empty();

    if as_json {
        let value = json!({
            "config": config,
            "run_in_flight": in_flight,
            "latest_run": latest,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_config(&config);
    println!("  In flight:    {}", if in_flight { "yes" } else { "no" });

    match latest {
        Some(log) => {
            println!("\n{}", style("Latest Run").bold());
            println!("  ID:           {}", log.execution_id);
            println!("  Status:       {}", log.status.as_str());
            println!("  Started:      {}", format_time(Some(log.start_time)));
            println!("  Finished:     {}", format_time(log.end_time));
            println!(
                "  Searches:     {}/{}",
                log.counters.successful_searches, log.counters.total_searches
            );
            println!(
                "  Properties:   {}/{}",
                log.counters.properties_saved, log.counters.total_properties
            );
            if let Some(err) = &log.error_message {
                println!("  Error:        {}", style(err).red());
            }
        }
        None => println!("\n  No runs yet"),
    }
    Ok(())
}

/// Show the config, or validate and apply an update.
pub async fn cmd_scheduler_config(
    settings: &Settings,
    update: &SchedulerConfigUpdate,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if update.is_empty() {
        print_config(&ctx.scheduler_config().get_or_create().await?);
        return Ok(());
    }

    let scheduler = build_scheduler(settings, ctx)?;
    let updated = scheduler.update_config(update).await?;
    println!("{} Scheduler configuration updated", style("✓").green());
    print_config(&updated);
    Ok(())
}

fn print_config(config: &SchedulerSettings) {
    println!("\n{}", style("Scheduler").bold());
    println!(
        "  Enabled:      {}",
        if config.is_enabled { "yes" } else { "no" }
    );
    println!("  Interval:     {} minutes", config.schedule_interval_minutes);
    println!("  Workers:      {}", config.max_concurrent_workers);
    println!("  Timeout:      {} minutes", config.timeout_minutes);
    println!("  Retries:      {}", config.retry_attempts);
    println!("  Last run:     {}", format_time(config.last_scheduled_run));
    println!("  Next run:     {}", format_time(config.next_scheduled_run));
}
