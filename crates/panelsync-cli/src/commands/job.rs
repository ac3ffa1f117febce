//! Job queue CLI commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_core::types::Job;
use panelsync_storage::naming::base_name;
use panelsync_storage::queue::JobQueue;

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Queue an IGES import into a CAD document
    ImportIges {
        /// Target CAD document (.ipt)
        ipt: PathBuf,
        /// IGES artifact to import
        iges: PathBuf,
        /// Leave the document in the background
        #[arg(long)]
        no_focus: bool,
    },
    /// Queue an OBJ export of an open CAD document
    ExportObj {
        /// CAD document (.ipt)
        ipt: PathBuf,
        /// Panel identifier
        #[arg(long, default_value = "")]
        panel: String,
        /// Panel revision
        #[arg(long, default_value = "A")]
        rev: String,
        /// Output folder (defaults to the hot folder's OBJ inbox)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List queued job files
    List,
}

#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    file: String,
    kind: String,
    target: String,
    project: String,
}

/// Execute job commands
pub async fn execute(args: &JobArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let queue = JobQueue::from_config(config.hot_folder.jobs_dir(), &config.watcher);
    let project_id = &config.project.project_id;

    match &args.command {
        JobCommand::ImportIges {
            ipt,
            iges,
            no_focus,
        } => {
            let job = Job::import_iges(ipt.to_string_lossy(), iges.to_string_lossy())
                .with_project_id(project_id)
                .with_bring_to_front(!no_focus);
            let path = queue.enqueue(&job, &base_name(ipt)).await?;
            output::print_success(&format!("Job queued: {}", path.display()));
        }
        JobCommand::ExportObj {
            ipt,
            panel,
            rev,
            out,
        } => {
            let out = out.clone().unwrap_or_else(|| config.hot_folder.obj_dir());
            let job = Job::export_obj(
                ipt.to_string_lossy(),
                out.to_string_lossy(),
                panel.as_str(),
                rev.as_str(),
            )
            .with_project_id(project_id);
            let path = queue
                .enqueue(&job, &format!("{}_OBJ", base_name(ipt)))
                .await?;
            output::print_success(&format!("Job queued: {}", path.display()));
        }
        JobCommand::List => {
            let rows: Vec<JobRow> = queue
                .list()
                .await?
                .into_iter()
                .map(|queued| {
                    let file = queued
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    match queued.job {
                        Ok(job) => JobRow {
                            file,
                            kind: job
                                .kind()
                                .map(|k| k.to_string())
                                .unwrap_or_else(|| "unknown".to_string()),
                            target: job
                                .target_document()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default(),
                            project: job.project_id.unwrap_or_default(),
                        },
                        Err(e) => JobRow {
                            file,
                            kind: "invalid".to_string(),
                            target: e.to_string(),
                            project: String::new(),
                        },
                    }
                })
                .collect();
            output::print_list(&rows, format);

            let stats = queue.stats().await?;
            if stats.claimed > 0 {
                output::print_warning(&format!(
                    "{} claimed job file(s) left behind in {}",
                    stats.claimed,
                    queue.dir().display()
                ));
            }
        }
    }

    Ok(())
}
