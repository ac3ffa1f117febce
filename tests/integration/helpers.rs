//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use panelsync_core::config::{AppConfig, HotFolderConfig};
use panelsync_core::result::AppResult;
use panelsync_storage::HotFolderSet;
use panelsync_worker::jobs::standard_executor;
use panelsync_worker::runner::RunnerSnapshot;
use panelsync_worker::{JobQueue, SimulatedHost, WorkerRunner};

/// A hot folder in a temp directory with fast stability timings.
pub struct TestHotFolder {
    dir: TempDir,
    /// Effective configuration
    pub config: AppConfig,
    /// Host the agent executes jobs against
    pub host: Arc<SimulatedHost>,
}

impl TestHotFolder {
    /// Create and initialize a new hot folder
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`new`](Self::new) with a hook to adjust the configuration
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::default();
        config.hot_folder = HotFolderConfig::at(dir.path().join("PanelSyncHot"));
        config.watcher.dwell_ms = 150;
        config.watcher.poll_ms = 25;
        config.watcher.timeout_ms = 3000;
        config.watcher.artifact_dwell_ms = 150;
        config.watcher.artifact_poll_ms = 25;
        config.watcher.artifact_timeout_ms = 3000;
        adjust(&mut config);

        HotFolderSet::new(config.hot_folder.clone())
            .ensure()
            .await
            .expect("Failed to create hot folder");

        Self {
            dir,
            config,
            host: Arc::new(SimulatedHost::new()),
        }
    }

    /// Scratch directory outside the hot folder
    pub fn scratch(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("scratch").join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create scratch dir");
        }
        path
    }

    /// Producer view of the job queue
    pub fn queue(&self) -> JobQueue {
        JobQueue::from_config(self.config.hot_folder.jobs_dir(), &self.config.watcher)
    }

    /// Start the consumer side and give the watcher time to arm
    pub async fn start_agent(&self) -> RunningAgent {
        let executor = Arc::new(standard_executor(self.host.clone(), &self.config.watcher));
        let runner = WorkerRunner::new(self.queue(), executor, self.config.watcher.clone());
        let cancel = CancellationToken::new();

        let task_runner = runner.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { task_runner.run(task_cancel).await });
        tokio::time::sleep(Duration::from_millis(300)).await;

        RunningAgent {
            runner,
            cancel,
            handle,
        }
    }
}

/// A consumer runner executing in the background
pub struct RunningAgent {
    /// Handle for reading stats
    pub runner: WorkerRunner,
    cancel: CancellationToken,
    handle: JoinHandle<AppResult<()>>,
}

impl RunningAgent {
    /// Wait until `done` holds for the runner stats and the queue is empty
    pub async fn settle(&self, done: impl Fn(&RunnerSnapshot) -> bool) -> RunnerSnapshot {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        loop {
            let stats = self.runner.stats();
            let pending = self
                .runner
                .queue()
                .pending()
                .await
                .expect("Failed to list jobs");
            if done(&stats) && pending.is_empty() {
                return stats;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "agent did not settle: {stats:?}, pending {pending:?}"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Cancel the runner and return its final stats
    pub async fn stop(self) -> RunnerSnapshot {
        self.cancel.cancel();
        self.handle
            .await
            .expect("Runner task panicked")
            .expect("Runner returned an error");
        self.runner.stats()
    }
}
