//! CLI command definitions and dispatch.

pub mod artifact;
pub mod config;
pub mod export;
pub mod folders;
pub mod job;
pub mod logs;
pub mod watch;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_core::logging::{init_logging, PRODUCER_LOG_FILE};

/// PanelSync: hot folder handoff between the surveying tool and the CAD modeler
#[derive(Debug, Parser)]
#[command(name = "panelsync", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to $PANELSYNC_CONFIG or config/default.toml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hot folder management
    Folders(folders::FoldersArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Scripted exports from the surveying tool
    Export(export::ExportArgs),
    /// Job queue management
    Job(job::JobArgs),
    /// Soft-validate an artifact
    Validate(artifact::ValidateArgs),
    /// Wait until a file stops changing
    WaitStable(artifact::WaitStableArgs),
    /// Show the newest stable published artifact
    Latest(artifact::LatestArgs),
    /// Watch for meshes exported by the CAD side
    WatchObj,
    /// Consumer log access
    Logs(logs::LogsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config_path = AppConfig::resolve_path(self.config.as_deref());
        let config = load_config(&config_path)?;

        if let Err(e) = init_logging(
            &config.logging,
            &config.hot_folder.logs_dir(),
            PRODUCER_LOG_FILE,
        ) {
            output::print_warning(&format!("File logging disabled: {}", e));
        }

        match &self.command {
            Commands::Folders(args) => folders::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, &config_path, self.format),
            Commands::Export(args) => export::execute(args, &config, self.format).await,
            Commands::Job(args) => job::execute(args, &config, self.format).await,
            Commands::Validate(args) => artifact::validate(args, self.format).await,
            Commands::WaitStable(args) => artifact::wait_stable(args, &config).await,
            Commands::Latest(args) => artifact::latest(args, &config, self.format).await,
            Commands::WatchObj => watch::execute(&config).await,
            Commands::Logs(args) => logs::execute(args, &config).await,
        }
    }
}

/// Helper: load configuration from file and environment
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
}

/// Helper: a token cancelled on Ctrl-C
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}
