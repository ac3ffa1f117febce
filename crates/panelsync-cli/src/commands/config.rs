//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Summarize the derived hot folder layout and project identity
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => output::print_item(config, format),
        ConfigCommand::Validate => {
            output::print_success(&format!("Configuration '{}' is valid", config_path));
            output::print_kv("Hot folder", &config.hot_folder.root().display().to_string());
            output::print_kv("Jobs", &config.hot_folder.jobs_dir().display().to_string());
            output::print_kv("Project", &config.project.project_id);
            output::print_kv("Group", &config.project.group);
            output::print_kv(
                "Export app",
                &config
                    .export
                    .explicit_app_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(discover)".to_string()),
            );
            output::print_kv("Concurrency", &config.watcher.concurrency.to_string());
        }
    }
    Ok(())
}
