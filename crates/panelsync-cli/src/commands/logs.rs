//! Consumer log CLI commands.

use std::time::Duration;

use clap::{Args, Subcommand};

use crate::output;
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_core::logging::CONSUMER_LOG_FILE;
use panelsync_storage::follow::classify;
use panelsync_storage::{LogFollower, LogHighlight};

/// Arguments for log commands
#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Logs subcommand
    #[command(subcommand)]
    pub command: LogsCommand,
}

/// Logs subcommands
#[derive(Debug, Subcommand)]
pub enum LogsCommand {
    /// Surface import/export completions and warnings from the consumer log
    Follow {
        /// Start from the beginning of the file instead of its end
        #[arg(long)]
        from_start: bool,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Print every line, not only highlights
        #[arg(long)]
        all: bool,
    },
}

/// Execute log commands
pub async fn execute(args: &LogsArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        LogsCommand::Follow {
            from_start,
            interval_ms,
            all,
        } => {
            let path = config.hot_folder.logs_dir().join(CONSUMER_LOG_FILE);
            let mut follower = if *from_start {
                LogFollower::new(&path)
            } else {
                LogFollower::from_end(&path).await
            };
            output::print_kv("Following", &path.display().to_string());

            let cancel = super::ctrl_c_token();
            let mut ticker = tokio::time::interval(Duration::from_millis((*interval_ms).max(50)));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if *all {
                    for line in follower.poll().await? {
                        match classify(&line) {
                            Some(highlight) => print_highlight(highlight, &line),
                            None => println!("{}", line),
                        }
                    }
                } else {
                    for (highlight, line) in follower.poll_highlights().await? {
                        print_highlight(highlight, &line);
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_highlight(highlight: LogHighlight, line: &str) {
    match highlight {
        LogHighlight::Warning => output::print_warning(line),
        _ => println!("[{}] {}", highlight.label(), line),
    }
}
