//! PanelSync agent: the consumer side of the hot folder handoff.
//!
//! Watches `Jobs/` and executes each job against the host application.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_core::logging::{init_logging, CONSUMER_LOG_FILE};
use panelsync_core::traits::HostApplication;
use panelsync_storage::HotFolderSet;
use panelsync_worker::jobs::standard_executor;
use panelsync_worker::{JobQueue, SimulatedHost, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(
        &config.logging,
        &config.hot_folder.logs_dir(),
        CONSUMER_LOG_FILE,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Agent error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let explicit = std::env::args().nth(1);
    let config_path = AppConfig::resolve_path(explicit.as_deref());
    AppConfig::load(&config_path)
}

/// Main agent run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting PanelSync agent v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Hot folder set ───────────────────────────────────
    let folders = HotFolderSet::new(config.hot_folder.clone());
    let created = folders.ensure().await?;
    tracing::info!(
        root = %folders.root().display(),
        created = created.len(),
        "Hot folder ready"
    );

    // ── Step 2: Host binding ─────────────────────────────────────
    let host: Arc<dyn HostApplication> = Arc::new(SimulatedHost::new());
    tracing::info!(host = host.name(), version = %host.version(), "Host binding ready");

    // ── Step 3: Job executor ─────────────────────────────────────
    let executor = Arc::new(standard_executor(host, &config.watcher));
    tracing::info!(kinds = ?executor.registered_kinds(), "Job handlers registered");

    // ── Step 4: Watcher runner ───────────────────────────────────
    let queue = JobQueue::from_config(folders.jobs_dir(), &config.watcher);
    let runner = WorkerRunner::new(queue, executor, config.watcher.clone());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    runner.run(cancel).await?;
    tracing::info!(stats = ?runner.stats(), "PanelSync agent stopped");
    Ok(())
}

/// Wait for Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
