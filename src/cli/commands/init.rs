//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::models::MessageTemplate;

use super::helpers::open_db;

/// Name given to the template seeded on first init.
const SEED_TEMPLATE_NAME: &str = "default";

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let existed = settings.database_exists();
    let ctx = open_db(settings).await?;

    let scheduler = ctx.scheduler_config().get_or_create().await?;

    let templates = ctx.message_templates();
    if templates.list().await?.is_empty() {
        templates
            .upsert(SEED_TEMPLATE_NAME, &MessageTemplate::fallback().body)
            .await?;
        templates.set_default(SEED_TEMPLATE_NAME).await?;
        println!(
            "  {} Added message template: {}",
            style("✓").green(),
            SEED_TEMPLATE_NAME
        );
    }

    if ctx.search_configs().list_all().await?.is_empty() {
        println!("{} No search configurations yet", style("!").yellow());
        println!("  Add one with 'scout search add <term> --ne-lat .. --ne-long .. --sw-lat .. --sw-long ..'");
    }

    println!(
        "{} {} listingscout in {}",
        style("✓").green(),
        if existed { "Already initialized" } else { "Initialized" },
        settings.data_dir.display()
    );
    println!("  Database:  {}", settings.database_url());
    println!("  Logs:      {}", settings.log_dir.display());
    println!(
        "  Scheduler: {}, every {} minutes",
        if scheduler.is_enabled { "enabled" } else { "disabled" },
        scheduler.schedule_interval_minutes
    );

    Ok(())
}
