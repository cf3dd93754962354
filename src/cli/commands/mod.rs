//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod helpers;
mod init;
mod logs;
mod notify;
mod properties;
mod run_cmd;
mod scheduler;
mod search;
mod template;

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{load_settings_with_options, LoadOptions};
use crate::models::ConfigValidationError;
use crate::services::SchedulerError;

/// Exit status for a successful command.
pub const EXIT_OK: i32 = 0;
/// Any failure not covered below.
pub const EXIT_FAILURE: i32 = 1;
/// A scraper run was already in progress.
pub const EXIT_ALREADY_RUNNING: i32 = 2;
/// Arguments or configuration values were rejected.
pub const EXIT_INVALID_INPUT: i32 = 3;

/// Rejected command-line input.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

/// Map a command error to a process exit status.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<SchedulerError>() {
        match e {
            SchedulerError::AlreadyRunning => return EXIT_ALREADY_RUNNING,
            SchedulerError::Validation(_) => return EXIT_INVALID_INPUT,
            _ => {}
        }
    }
    if err.downcast_ref::<InvalidInput>().is_some()
        || err.downcast_ref::<ConfigValidationError>().is_some()
    {
        return EXIT_INVALID_INPUT;
    }
    EXIT_FAILURE
}

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Scheduled real-estate listing scraper with agent notification")]
#[command(version)]
pub struct Cli {
    /// Data directory (database, logs)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run the scraper once in the foreground
    Run,

    /// Periodic scheduling
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommands,
    },

    /// Manage search configurations
    Search {
        #[command(subcommand)]
        command: SearchCommands,
    },

    /// Inspect execution logs
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },

    /// Manage SMS message templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Text listing agents found in stored properties
    Notify {
        /// Only properties from this search term
        #[arg(short, long)]
        search: Option<String>,
        /// Template name (defaults to the default template)
        #[arg(short, long)]
        template: Option<String>,
        /// Print the messages without sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect stored properties
    Properties {
        #[command(subcommand)]
        command: PropertiesCommands,
    },
}

#[derive(Subcommand)]
enum SchedulerCommands {
    /// Start the scheduler and run until interrupted
    Start,
    /// Show scheduler state and the last run
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or update scheduler configuration
    Config {
        /// Enable scheduled runs
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        /// Disable scheduled runs
        #[arg(long)]
        disable: bool,
        /// Minutes between runs (1-1440)
        #[arg(long)]
        interval: Option<u32>,
        /// Concurrent search configurations per run
        #[arg(long)]
        workers: Option<u32>,
        /// Per-search fetch timeout in minutes (1-120)
        #[arg(long)]
        timeout: Option<u32>,
        /// Retries for a failed search fetch (0-10)
        #[arg(long)]
        retries: Option<u32>,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Add or replace a search configuration
    Add {
        /// Search term (unique)
        value: String,
        #[arg(long, allow_hyphen_values = true)]
        ne_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        ne_long: f64,
        #[arg(long, allow_hyphen_values = true)]
        sw_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        sw_long: f64,
        /// Result pages to request
        #[arg(short, long, default_value = "1")]
        pagination: u32,
        #[arg(long, default_value = "")]
        description: String,
        /// Save without scheduling it
        #[arg(long)]
        inactive: bool,
    },
    /// List search configurations
    List {
        /// Include inactive configurations
        #[arg(short, long)]
        all: bool,
    },
    /// Remove a search configuration
    Remove {
        value: String,
        /// Also delete its stored properties
        #[arg(long)]
        purge: bool,
    },
    /// Include a configuration in scheduled runs
    Activate { value: String },
    /// Exclude a configuration from scheduled runs
    Deactivate { value: String },
}

#[derive(Subcommand)]
enum LogsCommands {
    /// List recent executions
    List {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Show one execution and the tail of its log file
    Show {
        execution_id: String,
        /// Log lines to print
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add or replace a template
    Add {
        name: String,
        /// Body with {agent_name}, {property_address}, {property_price}, {search_area}
        body: String,
        /// Make it the default template
        #[arg(long)]
        default: bool,
    },
    /// List templates
    List,
    /// Make a template the default
    Default { name: String },
    /// Allow a template to be used for sending
    Activate { name: String },
    /// Keep a template but stop using it
    Deactivate { name: String },
    /// Delete a template
    Remove { name: String },
}

#[derive(Subcommand)]
enum PropertiesCommands {
    /// List stored properties
    List {
        /// Only this search term
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals per search term
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse arguments; help and version print and succeed, other parse errors
/// are invalid input.
fn parse_cli() -> anyhow::Result<Option<Cli>> {
    match Cli::try_parse() {
        Ok(cli) => Ok(Some(cli)),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(InvalidInput(e.render().to_string().trim_end().to_string()).into()),
    }
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let Some(cli) = parse_cli()? else {
        return Ok(());
    };

    let settings = load_settings_with_options(&LoadOptions {
        config_path: cli.config,
        data_dir: cli.data,
    })
    .map_err(|e| InvalidInput(e.to_string()))?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Run => run_cmd::cmd_run(&settings).await,
        Commands::Scheduler { command } => match command {
            SchedulerCommands::Start => scheduler::cmd_scheduler_start(&settings).await,
            SchedulerCommands::Status { json } => {
                scheduler::cmd_scheduler_status(&settings, json).await
            }
            SchedulerCommands::Config {
                enable,
                disable,
                interval,
                workers,
                timeout,
                retries,
            } => {
                let is_enabled = match (enable, disable) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                let update = crate::models::SchedulerConfigUpdate {
                    is_enabled,
                    schedule_interval_minutes: interval,
                    max_concurrent_workers: workers,
                    timeout_minutes: timeout,
                    retry_attempts: retries,
                };
                scheduler::cmd_scheduler_config(&settings, &update).await
            }
        },
        Commands::Search { command } => match command {
            SearchCommands::Add {
                value,
                ne_lat,
                ne_long,
                sw_lat,
                sw_long,
                pagination,
                description,
                inactive,
            } => {
                let bounds = crate::models::BoundingBox::new(ne_lat, ne_long, sw_lat, sw_long);
                search::cmd_search_add(&settings, &value, bounds, pagination, &description, !inactive)
                    .await
            }
            SearchCommands::List { all } => search::cmd_search_list(&settings, all).await,
            SearchCommands::Remove { value, purge } => {
                search::cmd_search_remove(&settings, &value, purge).await
            }
            SearchCommands::Activate { value } => {
                search::cmd_search_set_active(&settings, &value, true).await
            }
            SearchCommands::Deactivate { value } => {
                search::cmd_search_set_active(&settings, &value, false).await
            }
        },
        Commands::Logs { command } => match command {
            LogsCommands::List { limit } => logs::cmd_logs_list(&settings, limit).await,
            LogsCommands::Show {
                execution_id,
                lines,
            } => logs::cmd_logs_show(&settings, &execution_id, lines).await,
        },
        Commands::Template { command } => match command {
            TemplateCommands::Add {
                name,
                body,
                default,
            } => template::cmd_template_add(&settings, &name, &body, default).await,
            TemplateCommands::List => template::cmd_template_list(&settings).await,
            TemplateCommands::Remove { name } => {
                template::cmd_template_remove(&settings, &name).await
            }
            TemplateCommands::Default { name } => {
                template::cmd_template_default(&settings, &name).await
            }
            TemplateCommands::Activate { name } => {
                template::cmd_template_set_active(&settings, &name, true).await
            }
            TemplateCommands::Deactivate { name } => {
                template::cmd_template_set_active(&settings, &name, false).await
            }
        },
        Commands::Notify {
            search,
            template,
            dry_run,
        } => notify::cmd_notify(&settings, search.as_deref(), template.as_deref(), dry_run).await,
        Commands::Properties { command } => match command {
            PropertiesCommands::List {
                search,
                limit,
                json,
            } => properties::cmd_properties_list(&settings, search.as_deref(), limit, json).await,
            PropertiesCommands::Stats { json } => {
                properties::cmd_properties_stats(&settings, json).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            exit_code(&SchedulerError::AlreadyRunning.into()),
            EXIT_ALREADY_RUNNING
        );
        assert_eq!(
            exit_code(&SchedulerError::Validation(ConfigValidationError::Workers).into()),
            EXIT_INVALID_INPUT
        );
        assert_eq!(
            exit_code(&InvalidInput("bad bounds".to_string()).into()),
            EXIT_INVALID_INPUT
        );
        assert_eq!(exit_code(&anyhow::anyhow!("disk full")), EXIT_FAILURE);
        assert_ne!(EXIT_OK, EXIT_FAILURE);
    }

    #[test]
    fn test_parse_search_add_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "scout", "search", "add", "San Diego", "--ne-lat", "32.9", "--ne-long", "-117.0",
            "--sw-lat", "32.6", "--sw-long", "-117.3",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                command: SearchCommands::Add { sw_long, pagination, .. },
            } => {
                assert_eq!(sw_long, -117.3);
                assert_eq!(pagination, 1);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_enable_conflicts_with_disable() {
        let result = Cli::try_parse_from(["scout", "scheduler", "config", "--enable", "--disable"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_template_toggle_and_stats() {
        let cli = Cli::try_parse_from(["scout", "template", "deactivate", "intro"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Template {
                command: TemplateCommands::Deactivate { ref name }
            } if name == "intro"
        ));

        let cli = Cli::try_parse_from(["scout", "properties", "stats", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Properties {
                command: PropertiesCommands::Stats { json: true }
            }
        ));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
