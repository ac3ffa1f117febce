//! Job executor: dispatches decoded jobs to the handler for their kind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use panelsync_core::error::{AppError, ErrorKind};
use panelsync_core::types::{Job, JobKind};

/// Trait for job handler implementations.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Kind this handler processes.
    fn kind(&self) -> JobKind;

    async fn execute(&self, job: &Job) -> Result<JobOutcome, JobExecutionError>;
}

/// What a handler did with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Preconditions were not met; nothing was changed.
    Skipped(String),
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    #[error("No handler registered for job kind {0}")]
    Unsupported(String),

    /// The job body does not fit the handler it was routed to.
    #[error("Job does not match handler {0}")]
    WrongKind(JobKind),

    /// The referenced artifact never became stable.
    #[error("Artifact not ready: {path}")]
    ArtifactNotReady { path: PathBuf },

    /// The host application rejected an operation.
    #[error("Host operation failed: {0}")]
    Host(#[source] AppError),

    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Wrap a host-side failure.
    pub fn host(err: AppError) -> Self {
        JobExecutionError::Host(err)
    }
}

impl From<JobExecutionError> for AppError {
    fn from(err: JobExecutionError) -> Self {
        match err {
            JobExecutionError::Internal(inner) => inner,
            JobExecutionError::Host(_) => AppError::host(err.to_string()),
            JobExecutionError::ArtifactNotReady { .. } => {
                AppError::new(ErrorKind::Timeout, err.to_string())
            }
            JobExecutionError::Unsupported(_) | JobExecutionError::WrongKind(_) => {
                AppError::validation(err.to_string())
            }
        }
    }
}

/// Dispatches jobs to the handler registered for their kind.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        info!(kind = %kind, "Registered job handler");
        self.handlers.insert(kind, handler);
    }

    pub async fn execute(&self, job: &Job) -> Result<JobOutcome, JobExecutionError> {
        let kind = job
            .kind()
            .ok_or_else(|| JobExecutionError::Unsupported("unknown".to_string()))?;
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| JobExecutionError::Unsupported(kind.to_string()))?;

        debug!(
            kind = %kind,
            correlation_id = job.correlation_id.as_deref().unwrap_or(""),
            "Executing job"
        );
        handler.execute(job).await
    }

    pub fn has_handler(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<JobKind> {
        self.handlers.keys().copied().collect()
    }
}
