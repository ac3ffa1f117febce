//! Job queue over the `Jobs/` hot folder.
//!
//! Each job is one JSON file. Producers publish with an atomic write so the
//! watcher never reads a half-written body; consumers acknowledge by
//! deleting the file. The optional claim step renames a file to
//! `<name>.processing` before execution so that a restart does not pick it
//! up again.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use panelsync_core::config::WatcherConfig;
use panelsync_core::error::{AppError, ErrorKind};
use panelsync_core::result::AppResult;
use panelsync_core::types::{Job, JobError};
use crate::atomic::{is_temp_file, write_atomic};
use crate::naming::{job_file_name, safe_component};
use crate::watch::scan_existing;

/// Suffix appended to a claimed job file.
pub const CLAIM_SUFFIX: &str = ".processing";

/// File-backed job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

/// A job file found in the queue together with its decoded body.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub path: PathBuf,
    pub job: Result<Job, JobError>,
}

/// Queue statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Job files waiting to be picked up.
    pub pending: usize,
    /// Files left behind in the claimed state.
    pub claimed: usize,
}

impl JobQueue {
    /// Queue in `dir` with the default `job_*.json` naming.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = WatcherConfig::default();
        Self::with_pattern(dir, defaults.job_prefix, defaults.job_suffix)
    }

    /// Queue in `dir` with the naming pattern from `config`.
    pub fn from_config(dir: impl Into<PathBuf>, config: &WatcherConfig) -> Self {
        Self::with_pattern(dir, config.job_prefix.clone(), config.job_suffix.clone())
    }

    fn with_pattern(dir: impl Into<PathBuf>, prefix: String, suffix: String) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_ascii_lowercase(),
            suffix: suffix.to_ascii_lowercase(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `path` names a job file of this queue.
    pub fn matches(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return false;
        }
        path.file_name()
            .map(|n| {
                let name = n.to_string_lossy().to_ascii_lowercase();
                name.starts_with(&self.prefix) && name.ends_with(&self.suffix)
            })
            .unwrap_or(false)
    }

    /// Publish `job` as `job_<stamp>_<suffix>.json`.
    ///
    /// Invalid jobs are rejected before anything is written.
    pub async fn enqueue(&self, job: &Job, suffix: &str) -> AppResult<PathBuf> {
        job.validate()?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(job_file_name(Utc::now(), &safe_component(suffix, "job")));
        write_atomic(&path, &job.to_json()?).await?;

        info!(
            path = %path.display(),
            kind = ?job.kind(),
            correlation_id = job.correlation_id.as_deref().unwrap_or(""),
            "Job queued"
        );
        Ok(path)
    }

    /// Job files currently waiting, oldest name first.
    pub async fn pending(&self) -> AppResult<Vec<PathBuf>> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let queue = self.clone();
        scan_existing(&self.dir, move |p| queue.matches(p)).await
    }

    /// Pending job files with their decoded bodies.
    pub async fn list(&self) -> AppResult<Vec<QueuedJob>> {
        let mut jobs = Vec::new();
        for path in self.pending().await? {
            let job = match tokio::fs::read(&path).await {
                Ok(bytes) => Job::parse(&bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => Err(JobError::Malformed(e.to_string())),
            };
            jobs.push(QueuedJob { path, job });
        }
        Ok(jobs)
    }

    /// Rename `path` to its claimed name.
    ///
    /// Returns `None` when the file is already gone.
    pub async fn claim(&self, path: &Path) -> AppResult<Option<PathBuf>> {
        let claimed = claimed_path(path);
        match tokio::fs::rename(path, &claimed).await {
            Ok(()) => {
                debug!(path = %claimed.display(), "Job claimed");
                Ok(Some(claimed))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to claim job {}", path.display()),
                e,
            )),
        }
    }

    /// Remove a processed job file. A file that is already gone is fine.
    pub async fn acknowledge(&self, path: &Path) -> AppResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Job file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to remove job {}", path.display()),
                e,
            )),
        }
    }

    pub async fn stats(&self) -> AppResult<QueueStats> {
        let pending = self.pending().await?.len();
        let claimed = if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            scan_existing(&self.dir, |p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(CLAIM_SUFFIX))
                    .unwrap_or(false)
            })
            .await?
            .len()
        } else {
            0
        };
        Ok(QueueStats { pending, claimed })
    }
}

fn claimed_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(CLAIM_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_core::types::JobKind;

    #[tokio::test]
    async fn test_enqueue_writes_named_job() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(dir.path().join("Jobs"));
        let job = Job::import_iges("C:/p/site.ipt", "C:/hot/site.igs").with_project_id("PROJ");

        let path = queue.enqueue(&job, "site").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("job_"));
        assert!(name.ends_with("_site.json"));
        assert!(queue.matches(&path));

        let back = Job::parse(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, job);
        assert_eq!(back.kind(), Some(JobKind::ImportIges));
    }

    #[tokio::test]
    async fn test_enqueue_sanitizes_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(dir.path());
        let path = queue
            .enqueue(&Job::import_iges("a.ipt", "a.igs"), "../site plan")
            .await
            .unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.to_string_lossy().ends_with("____site_plan.json"));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_invalid_job() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(dir.path());
        let job = Job::import_iges("", "C:/hot/site.igs");

        assert!(queue.enqueue(&job, "x").await.is_err());
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_and_acknowledge() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(dir.path());
        let path = queue
            .enqueue(&Job::export_obj("a.ipt", "out", "P001", "A"), "a_OBJ")
            .await
            .unwrap();

        let claimed = queue.claim(&path).await.unwrap().unwrap();
        assert!(claimed.to_string_lossy().ends_with(".json.processing"));
        assert!(!queue.matches(&claimed));
        assert_eq!(queue.stats().await.unwrap(), QueueStats { pending: 0, claimed: 1 });
        assert!(queue.claim(&path).await.unwrap().is_none());

        queue.acknowledge(&claimed).await.unwrap();
        queue.acknowledge(&claimed).await.unwrap();
        assert_eq!(queue.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_list_reports_invalid_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(dir.path());
        std::fs::write(dir.path().join("job_1_bad.json"), br#"{"Kind":"Nope"}"#).unwrap();
        std::fs::write(dir.path().join("job_2_tmp.json.tmp.abc"), b"{}").unwrap();
        queue
            .enqueue(&Job::import_iges("a.ipt", "a.igs"), "ok")
            .await
            .unwrap();

        let listed = queue.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].job, Err(JobError::UnknownKind));
        assert!(listed[1].job.is_ok());
    }
}
