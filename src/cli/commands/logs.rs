//! Execution log commands.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::models::{ExecutionLog, ExecutionStatus};
use crate::services::read_log_tail;

use super::helpers::{format_time, open_db};
use super::InvalidInput;

fn styled_status(log: &ExecutionLog) -> console::StyledObject<&'static str> {
    let text = log.status.as_str();
    match log.status {
        ExecutionStatus::Completed => style(text).green(),
        ExecutionStatus::Failed => style(text).red(),
        ExecutionStatus::Cancelled => style(text).yellow(),
        ExecutionStatus::Running => style(text).cyan(),
    }
}

/// List recent executions, newest first.
pub async fn cmd_logs_list(settings: &Settings, limit: i64) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let logs = ctx.execution_logs().list_recent(limit.max(1)).await?;

    if logs.is_empty() {
        println!("{} No executions recorded yet", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Executions").bold());
    println!("{}", "-".repeat(92));
    println!(
        "{:<38} {:<10} {:<17} {:>8} {:>9} {:>10}",
        "ID", "Status", "Started", "Duration", "Searches", "Properties"
    );
    println!("{}", "-".repeat(92));

    for log in &logs {
        let duration = if log.end_time.is_some() {
            format!("{}s", log.duration().num_seconds())
        } else {
            "-".to_string()
        };
        println!(
            "{:<38} {:<10} {:<17} {:>8} {:>9} {:>10}",
            log.execution_id,
            styled_status(log),
            format_time(Some(log.start_time)),
            duration,
            format!(
                "{}/{}",
                log.counters.successful_searches, log.counters.total_searches
            ),
            format!(
                "{}/{}",
                log.counters.properties_saved, log.counters.total_properties
            )
        );
    }
    Ok(())
}

/// Show one execution and the last `lines` lines of its log file.
pub async fn cmd_logs_show(settings: &Settings, execution_id: &str, lines: usize) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let Some(log) = ctx.execution_logs().get(execution_id).await? else {
        return Err(InvalidInput(format!("execution '{}' not found", execution_id)).into());
    };

    println!("\n{}", style(format!("Execution {}", log.execution_id)).bold());
    println!("  Status:     {}", styled_status(&log));
    println!("  Started:    {}", format_time(Some(log.start_time)));
    println!("  Finished:   {}", format_time(log.end_time));
    println!(
        "  Searches:   {}/{} successful",
        log.counters.successful_searches, log.counters.total_searches
    );
    println!(
        "  Properties: {} saved of {} fetched",
        log.counters.properties_saved, log.counters.total_properties
    );
    if let Some(message) = &log.error_message {
        println!("  Error:      {}", style(message).red());
    }
    if let Some(details) = &log.error_details {
        println!("  Details:    {}", details);
    }

    let Some(path) = log.log_file_path.as_deref() else {
        println!("\n  No log file recorded");
        return Ok(());
    };
    match read_log_tail(Path::new(path), lines) {
        Ok(tail) => {
            println!("\n{} ({})", style("Log").bold(), path);
            for line in tail {
                println!("  {}", line);
            }
        }
        Err(e) => println!(
            "\n{} Log file {} unavailable: {}",
            style("!").yellow(),
            path,
            e
        ),
    }
    Ok(())
}
