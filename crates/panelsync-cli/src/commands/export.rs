//! Scripted export CLI commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_export::{ExportMode, ReferenceExportPipeline};

/// Arguments for export commands
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Export subcommand
    #[command(subcommand)]
    pub command: ExportCommand,
}

/// Export subcommands
#[derive(Debug, Subcommand)]
pub enum ExportCommand {
    /// Export IGES from a surveying document and queue its import
    Iges {
        /// Surveying document (.3dr)
        source: PathBuf,
        /// Export only the currently visible items
        #[arg(long)]
        visible_only: bool,
    },
    /// Export the configured group as a timestamped reference DXF
    Dxf {
        /// Surveying document (.3dr)
        source: PathBuf,
    },
    /// Locate the export application
    Discover,
}

/// Execute export commands
pub async fn execute(
    args: &ExportArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pipeline = ReferenceExportPipeline::new(config);

    match &args.command {
        ExportCommand::Iges {
            source,
            visible_only,
        } => {
            let mode = if *visible_only {
                ExportMode::VisibleOnly
            } else {
                ExportMode::All
            };
            match pipeline.export_iges_to_host(source, mode).await {
                Ok(handoff) => {
                    output::print_item(&handoff, format);
                    output::print_success("IGES published and import job queued");
                }
                Err(e) => {
                    output::print_error(&format!("IGES export failed: {}", e));
                    return Err(e.into());
                }
            }
        }
        ExportCommand::Dxf { source } => {
            let reference = pipeline.export_dxf_reference(source).await?;
            output::print_item(&reference, format);
            if reference.stub {
                output::print_warning("Export failed, a placeholder DXF was published");
            } else {
                output::print_success("Reference DXF published");
            }
        }
        ExportCommand::Discover => {
            let installation = pipeline.installation()?;
            output::print_item(&installation, format);
        }
    }

    if !matches!(args.command, ExportCommand::Discover) {
        let metrics = pipeline.driver().metrics_snapshot();
        tracing::debug!(?metrics, "Export metrics");
    }

    Ok(())
}
