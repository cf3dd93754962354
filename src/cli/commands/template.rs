//! Message template commands.

use console::style;

use crate::config::Settings;
use crate::models::PLACEHOLDERS;

use super::helpers::{format_time, open_db, truncate};
use super::InvalidInput;

/// Add or replace a template.
pub async fn cmd_template_add(
    settings: &Settings,
    name: &str,
    body: &str,
    make_default: bool,
) -> anyhow::Result<()> {
    if name.trim().is_empty() || body.trim().is_empty() {
        return Err(InvalidInput("template name and body must not be empty".to_string()).into());
    }

    let ctx = open_db(settings).await?;
    let templates = ctx.message_templates();
    let saved = templates.upsert(name, body).await?;
    if make_default {
        templates.set_default(name).await?;
    }

    println!("{} Saved template: {}", style("✓").green(), saved.name);
    if !PLACEHOLDERS.iter().any(|p| body.contains(p)) {
        println!(
            "{} Template uses no placeholders ({})",
            style("!").yellow(),
            PLACEHOLDERS.join(", ")
        );
    }
    Ok(())
}

/// List templates.
pub async fn cmd_template_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let templates = ctx.message_templates().list().await?;

    if templates.is_empty() {
        println!(
            "{} No templates. The built-in message is used until one is added.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Message Templates").bold());
    println!("{}", "-".repeat(90));
    println!("{:<20} {:<8} {:<7} {:<40} Updated", "Name", "Default", "Active", "Body");
    println!("{}", "-".repeat(90));
    for template in templates {
        println!(
            "{:<20} {:<8} {:<7} {:<40} {}",
            truncate(&template.name, 19),
            if template.is_default { "*" } else { "" },
            if template.is_active { "yes" } else { "no" },
            truncate(&template.body, 39),
            format_time(Some(template.updated_at))
        );
    }
    Ok(())
}

/// Make a template the default.
pub async fn cmd_template_default(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if !ctx.message_templates().set_default(name).await? {
        return Err(InvalidInput(format!("template '{}' not found", name)).into());
    }
    println!("{} Default template: {}", style("✓").green(), name);
    Ok(())
}

/// Enable or disable a template for sending.
///
/// An inactive default stops being the default until reactivated; `notify`
/// then falls back to the built-in message.
pub async fn cmd_template_set_active(
    settings: &Settings,
    name: &str,
    active: bool,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if !ctx.message_templates().set_active(name, active).await? {
        return Err(InvalidInput(format!("template '{}' not found", name)).into());
    }
    let verb = if active { "Activated" } else { "Deactivated" };
    println!("{} {} template: {}", style("✓").green(), verb, name);
    Ok(())
}

/// Delete a template.
pub async fn cmd_template_remove(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if !ctx.message_templates().delete(name).await? {
        return Err(InvalidInput(format!("template '{}' not found", name)).into());
    }
    println!("{} Removed template: {}", style("✓").green(), name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings::with_data_dir(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_deactivate_hides_default_template() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        cmd_template_add(&settings, "intro", "Hi {agent_name}", true)
            .await
            .unwrap();

        cmd_template_set_active(&settings, "intro", false).await.unwrap();
        let ctx = open_db(&settings).await.unwrap();
        assert!(ctx.message_templates().get_default().await.unwrap().is_none());
        let stored = ctx.message_templates().get_by_name("intro").await.unwrap().unwrap();
        assert!(!stored.is_active);

        cmd_template_set_active(&settings, "intro", true).await.unwrap();
        let restored = ctx.message_templates().get_default().await.unwrap().unwrap();
        assert_eq!(restored.name, "intro");
    }

    #[tokio::test]
    async fn test_activate_unknown_template_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_template_set_active(&settings(&dir), "missing", true)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<InvalidInput>().is_some());
    }
}
