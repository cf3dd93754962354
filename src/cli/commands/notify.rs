//! Agent notification command.

use console::style;

use crate::config::Settings;
use crate::models::MessageTemplate;
use crate::services::{collect_recipients, notify_agents, TwilioNotifier};

use crate::repository::DieselDbContext;

use super::helpers::open_db;
use super::InvalidInput;

/// The named template, or the active default, or the built-in message.
async fn resolve_template(
    ctx: &DieselDbContext,
    name: Option<&str>,
) -> anyhow::Result<MessageTemplate> {
    let Some(name) = name else {
        return Ok(ctx
            .message_templates()
            .get_default()
            .await?
            .unwrap_or_else(MessageTemplate::fallback));
    };
    match ctx.message_templates().get_by_name(name).await? {
        Some(template) if template.is_active => Ok(template),
        Some(_) => Err(InvalidInput(format!("template '{}' is inactive", name)).into()),
        None => Err(InvalidInput(format!("template '{}' not found", name)).into()),
    }
}

/// Message every unique agent, broker and co-agent in stored properties.
pub async fn cmd_notify(
    settings: &Settings,
    search: Option<&str>,
    template_name: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let template = resolve_template(&ctx, template_name).await?;

    let properties = match search {
        Some(term) => ctx.properties().get_by_search_term(term).await?,
        None => ctx.properties().get_all(None).await?,
    };
    let recipients = collect_recipients(&properties);
    println!(
        "{} {} recipients from {} properties (template: {})",
        style("→").cyan(),
        recipients.len(),
        properties.len(),
        template.name
    );
    if recipients.is_empty() {
        println!("{} No valid phone numbers found", style("!").yellow());
        return Ok(());
    }

    if dry_run {
        for recipient in &recipients {
            println!(
                "\n  {} <{}> {}",
                style(&recipient.name).bold(),
                recipient.phone,
                recipient.property_address
            );
            println!("  {}", template.render(&recipient.context()));
        }
        println!("\n{} Dry run, nothing sent", style("!").yellow());
        return Ok(());
    }

    let notifier = TwilioNotifier::new(settings.twilio.clone())
        .map_err(|e| InvalidInput(format!("{} (set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER)", e)))?;
    let summary = notify_agents(&notifier, &template, recipients).await;

    for outcome in &summary.outcomes {
        match &outcome.error {
            None => println!(
                "  {} {} <{}>",
                style("✓").green(),
                outcome.recipient.name,
                outcome.recipient.phone
            ),
            Some(err) => println!(
                "  {} {} <{}>: {}",
                style("✗").red(),
                outcome.recipient.name,
                outcome.recipient.phone,
                err
            ),
        }
    }
    println!(
        "\n{} Sent {}/{} messages ({} failed)",
        if summary.failed == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        summary.sent,
        summary.total_recipients,
        summary.failed
    );
    Ok(())
}
