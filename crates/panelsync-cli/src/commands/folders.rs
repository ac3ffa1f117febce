//! Hot folder CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_storage::HotFolderSet;

/// Arguments for folder commands
#[derive(Debug, Args)]
pub struct FoldersArgs {
    /// Folder subcommand
    #[command(subcommand)]
    pub command: FoldersCommand,
}

/// Folder subcommands
#[derive(Debug, Subcommand)]
pub enum FoldersCommand {
    /// Create every hot folder directory
    Init,
    /// List the hot folder directories
    Show,
}

#[derive(Debug, Serialize, Tabled)]
struct FolderRow {
    path: String,
    exists: bool,
}

/// Execute folder commands
pub async fn execute(
    args: &FoldersArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let folders = HotFolderSet::new(config.hot_folder.clone());

    match &args.command {
        FoldersCommand::Init => {
            let created = folders.ensure().await?;
            if created.is_empty() {
                output::print_success(&format!(
                    "Hot folder '{}' already initialized",
                    folders.root().display()
                ));
            } else {
                for dir in &created {
                    output::print_kv("Created", &dir.display().to_string());
                }
                output::print_success(&format!(
                    "Hot folder '{}' ready ({} directories created)",
                    folders.root().display(),
                    created.len()
                ));
            }
        }
        FoldersCommand::Show => {
            let rows: Vec<FolderRow> = folders
                .layout()
                .all_dirs()
                .into_iter()
                .map(|dir| FolderRow {
                    exists: dir.is_dir(),
                    path: dir.display().to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
