//! Search configuration commands.

use console::style;

use crate::config::Settings;
use crate::models::{BoundingBox, SearchConfig};

use super::helpers::{format_time, open_db, truncate};
use super::InvalidInput;

/// Add or replace a search configuration.
pub async fn cmd_search_add(
    settings: &Settings,
    value: &str,
    bounds: BoundingBox,
    pagination: u32,
    description: &str,
    active: bool,
) -> anyhow::Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InvalidInput("search term must not be empty".to_string()).into());
    }
    if !bounds.is_valid() {
        return Err(InvalidInput(format!(
            "invalid bounding box: north-east ({}, {}) must lie north-east of south-west ({}, {})",
            bounds.ne_lat, bounds.ne_long, bounds.sw_lat, bounds.sw_long
        ))
        .into());
    }
    if pagination == 0 {
        return Err(InvalidInput("pagination must be at least 1".to_string()).into());
    }

    let ctx = open_db(settings).await?;
    let existed = ctx.search_configs().get_by_value(value).await?.is_some();

    let mut config = SearchConfig::new(value, bounds, pagination).with_description(description);
    config.is_active = active;
    let saved = ctx.search_configs().upsert(&config).await?;

    println!(
        "{} {} search configuration: {}{}",
        style("✓").green(),
        if existed { "Updated" } else { "Added" },
        saved.search_value,
        if saved.is_active { "" } else { " (inactive)" }
    );
    Ok(())
}

/// List search configurations with their stored property counts.
pub async fn cmd_search_list(settings: &Settings, include_inactive: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let configs = if include_inactive {
        ctx.search_configs().list_all().await?
    } else {
        ctx.search_configs().list_active().await?
    };

    if configs.is_empty() {
        println!(
            "{} No search configurations. Add one with 'scout search add'.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Search Configurations").bold());
    println!("{}", "-".repeat(96));
    println!(
        "{:<24} {:<8} {:<5} {:<10} {:<28} Updated",
        "Search", "Active", "Pages", "Properties", "Bounds (NE / SW)"
    );
    println!("{}", "-".repeat(96));

    for config in configs {
        let count = ctx.properties().count(Some(&config.search_value)).await?;
        let b = config.bounds;
        println!(
            "{:<24} {:<8} {:<5} {:<10} {:<28} {}",
            truncate(&config.search_value, 23),
            if config.is_active { "yes" } else { "no" },
            config.pagination,
            count,
            format!("{:.2},{:.2} / {:.2},{:.2}", b.ne_lat, b.ne_long, b.sw_lat, b.sw_long),
            format_time(Some(config.updated_at))
        );
    }
    Ok(())
}

/// Remove a configuration. Its properties stay unless `purge` is set.
pub async fn cmd_search_remove(settings: &Settings, value: &str, purge: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if !ctx.search_configs().delete(value).await? {
        return Err(InvalidInput(format!("search configuration '{}' not found", value)).into());
    }
    println!("{} Removed search configuration: {}", style("✓").green(), value);

    if purge {
        let removed = ctx.properties().delete_by_search_term(value).await?;
        println!("  Deleted {} stored properties", removed);
    }
    Ok(())
}

/// Toggle whether a configuration is included in runs.
pub async fn cmd_search_set_active(settings: &Settings, value: &str, active: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if !ctx.search_configs().set_active(value, active).await? {
        return Err(InvalidInput(format!("search configuration '{}' not found", value)).into());
    }
    println!(
        "{} {} search configuration: {}",
        style("✓").green(),
        if active { "Activated" } else { "Deactivated" },
        value
    );
    Ok(())
}
