//! Property listing and summary commands.

use console::style;
use serde::Serialize;

use crate::config::Settings;
use crate::repository::DieselDbContext;
use crate::services::collect_recipients;

use super::helpers::{format_time, open_db, truncate};

/// List stored properties, optionally for one search term.
pub async fn cmd_properties_list(
    settings: &Settings,
    search: Option<&str>,
    limit: i64,
    as_json: bool,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let mut properties = match search {
        Some(term) => ctx.properties().get_by_search_term(term).await?,
        None => ctx.properties().get_all(Some(limit)).await?,
    };
    properties.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&properties)?);
        return Ok(());
    }

    if properties.is_empty() {
        println!("{} No properties stored", style("!").yellow());
        return Ok(());
    }

    let total = ctx.properties().count(search).await?;
    println!(
        "\n{} ({} of {})",
        style("Properties").bold(),
        properties.len(),
        total
    );
    println!("{}", "-".repeat(100));
    println!(
        "{:<36} {:<12} {:<18} {:<22} {}",
        "Address", "Price", "Search", "Agent", "Phone"
    );
    println!("{}", "-".repeat(100));
    for property in properties {
        let attr = &property.attribution;
        println!(
            "{:<36} {:<12} {:<18} {:<22} {}",
            truncate(&property.address, 35),
            truncate(property.price.as_deref().unwrap_or("-"), 11),
            truncate(&property.search_term, 17),
            truncate(attr.agent_name.as_deref().unwrap_or("-"), 21),
            attr.agent_phone_number.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct TermCount {
    search_term: String,
    properties: i64,
}

#[derive(Debug, Serialize)]
struct PropertyStats {
    total_properties: i64,
    search_terms: Vec<TermCount>,
    unique_recipients: usize,
}

async fn gather_stats(ctx: &DieselDbContext) -> anyhow::Result<PropertyStats> {
    let repo = ctx.properties();
    let mut search_terms = Vec::new();
    for term in repo.unique_search_terms().await? {
        let properties = repo.count(Some(&term)).await?;
        search_terms.push(TermCount {
            search_term: term,
            properties,
        });
    }
    Ok(PropertyStats {
        total_properties: repo.count(None).await?,
        search_terms,
        unique_recipients: collect_recipients(&repo.get_all(None).await?).len(),
    })
}

/// Summarize stored properties per search term.
pub async fn cmd_properties_stats(settings: &Settings, as_json: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let stats = gather_stats(&ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style("Property Store").bold());
    println!("  Properties:   {}", stats.total_properties);
    println!("  Recipients:   {}", stats.unique_recipients);
    if let Some(run) = ctx.execution_logs().last_finished().await? {
        println!(
            "  Last run:     {} ({})",
            format_time(run.end_time),
            run.status.as_str()
        );
    }

    if stats.search_terms.is_empty() {
        println!("\n{} No properties stored", style("!").yellow());
        return Ok(());
    }
    println!("\n{:<30} Properties", "Search term");
    println!("{}", "-".repeat(42));
    for term in &stats.search_terms {
        println!("{:<30} {}", truncate(&term.search_term, 29), term.properties);
    }
    Ok(())
}
