//! Worker runner: watches `Jobs/` and executes each job file once.
//!
//! Every stability-confirmed job file is handled on its own task. Tasks are
//! unordered and bounded by a semaphore; a path already being handled is
//! not dispatched again until its task finishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use panelsync_core::config::WatcherConfig;
use panelsync_core::result::AppResult;
use panelsync_core::types::Job;
use panelsync_storage::{wait_until_stable, FolderWatcher, JobQueue};

use crate::executor::{JobExecutor, JobOutcome};

/// How long shutdown waits for in-flight jobs.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Result of handling one job file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Never became stable, vanished, or was taken by someone else.
    Dropped,
    /// Body could not be decoded or failed validation.
    Invalid,
    Completed,
    Skipped(String),
    Failed(String),
}

/// Per-runner counters.
#[derive(Debug, Default)]
pub struct RunnerStats {
    pub attempted: AtomicU64,
    pub completed: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub invalid: AtomicU64,
    pub dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub attempted: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub invalid: u64,
    pub dropped: u64,
}

impl RunnerStats {
    fn record(&self, outcome: &FileOutcome) {
        let counter = match outcome {
            FileOutcome::Dropped => &self.dropped,
            FileOutcome::Invalid => &self.invalid,
            FileOutcome::Completed => &self.completed,
            FileOutcome::Skipped(_) => &self.skipped,
            FileOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        RunnerSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Watches the job folder and dispatches job files to the executor.
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    queue: JobQueue,
    executor: Arc<JobExecutor>,
    config: WatcherConfig,
    in_flight: Arc<DashSet<PathBuf>>,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    stats: Arc<RunnerStats>,
}

impl WorkerRunner {
    pub fn new(queue: JobQueue, executor: Arc<JobExecutor>, config: WatcherConfig) -> Self {
        let permits = config.concurrency.max(1);
        Self {
            queue,
            executor,
            config,
            in_flight: Arc::new(DashSet::new()),
            semaphore: Arc::new(Semaphore::new(permits)),
            tracker: TaskTracker::new(),
            stats: Arc::new(RunnerStats::default()),
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn stats(&self) -> RunnerSnapshot {
        self.stats.snapshot()
    }

    /// Run until `cancel` fires, then wait for in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<()> {
        let dir = self.queue.dir().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let filter = self.queue.clone();
        let (_watcher, mut events) = FolderWatcher::watch(&dir, move |p| filter.matches(p))?;
        info!(
            dir = %dir.display(),
            concurrency = self.config.concurrency,
            claim = self.config.claim_before_execute,
            "Job watcher armed"
        );

        if self.config.scan_on_start {
            let existing = self.queue.pending().await?;
            if !existing.is_empty() {
                info!(count = existing.len(), "Picking up jobs already queued");
            }
            for path in existing {
                self.dispatch(path);
            }
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Job watcher received shutdown signal");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event.path),
                    None => {
                        warn!("Job watcher channel closed");
                        break;
                    }
                }
            }
        }

        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(in_flight = self.in_flight.len(), "Shutdown grace elapsed with jobs still running");
        }
        info!(stats = ?self.stats(), "Job watcher stopped");
        Ok(())
    }

    /// Hand `path` to its own task unless it is already being handled.
    pub fn dispatch(&self, path: PathBuf) {
        if !self.in_flight.insert(path.clone()) {
            debug!(path = %path.display(), "Job already in flight, ignoring event");
            return;
        }

        let this = self.clone();
        self.tracker.spawn(async move {
            if let Ok(_permit) = this.semaphore.clone().acquire_owned().await {
                this.process_file(&path).await;
            }
            this.in_flight.remove(&path);
        });
    }

    /// Stability gate, decode, execute, then remove the file.
    #[instrument(skip(self), fields(job = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> FileOutcome {
        let outcome = self.process_inner(path).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn process_inner(&self, path: &Path) -> FileOutcome {
        if !wait_until_stable(path, self.config.job_policy()).await {
            debug!("Job file not stable, dropping event");
            return FileOutcome::Dropped;
        }

        let path = if self.config.claim_before_execute {
            match self.queue.claim(path).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => return FileOutcome::Dropped,
                Err(e) => {
                    warn!(error = %e, "Could not claim job");
                    return FileOutcome::Dropped;
                }
            }
        } else {
            path.to_path_buf()
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Job file unreadable, dropping event");
                return FileOutcome::Dropped;
            }
        };

        let job = match self.decode(&bytes) {
            Ok(job) => job,
            Err(reason) => {
                warn!(%reason, "Invalid job");
                if self.config.remove_invalid {
                    self.remove(&path).await;
                }
                return FileOutcome::Invalid;
            }
        };

        self.stats.attempted.fetch_add(1, Ordering::Relaxed);
        let outcome = match self.executor.execute(&job).await {
            Ok(JobOutcome::Completed) => {
                info!(kind = ?job.kind(), "Job completed");
                FileOutcome::Completed
            }
            Ok(JobOutcome::Skipped(reason)) => {
                warn!(kind = ?job.kind(), %reason, "Job skipped");
                FileOutcome::Skipped(reason)
            }
            Err(e) => {
                error!(kind = ?job.kind(), error = %e, "Job failed");
                FileOutcome::Failed(e.to_string())
            }
        };

        let keep = matches!(outcome, FileOutcome::Failed(_)) && self.config.retain_failed;
        if keep {
            info!(path = %path.display(), "Keeping failed job file");
        } else {
            self.remove(&path).await;
        }
        outcome
    }

    fn decode(&self, bytes: &[u8]) -> Result<Job, String> {
        let job = Job::parse(bytes).map_err(|e| e.to_string())?;
        if let Some(expected) = self.config.expected_project_id.as_deref() {
            job.check_project(expected).map_err(|e| e.to_string())?;
        }
        Ok(job)
    }

    async fn remove(&self, path: &Path) {
        if let Err(e) = self.queue.acknowledge(path).await {
            error!(path = %path.display(), error = %e, "Failed to remove job file");
        }
    }
}
