//! Error type for the export side.
//!
//! Every failure of a scripted export run is one `ExportError` variant, and
//! each maps onto `panelsync_core::error::AppError` for the binaries.

use std::path::PathBuf;

use panelsync_core::error::AppError;
use thiserror::Error;

/// Errors raised while driving the export application.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A required file was missing before anything was spawned.
    #[error("{what} not found: {path}")]
    NotFound {
        /// Which dependency was missing (application, script, source document).
        what: &'static str,
        /// The path that was checked.
        path: PathBuf,
    },

    /// No export application could be located.
    #[error("Export application not found. Searched: configured path, registry, install folders and PATH")]
    AppNotDiscovered,

    /// The child process could not be started.
    #[error("Failed to start {app}: {source}")]
    Spawn {
        app: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run exceeded its time budget and the process tree was killed.
    #[error("Export timed out after {timeout_seconds}s")]
    Timeout {
        timeout_seconds: u64,
    },

    /// The process finished without writing the expected artifact.
    #[error("Export produced no output: {path}")]
    NoOutput {
        path: PathBuf,
    },

    /// The artifact never settled within the final stability window.
    #[error("Export output never became stable: {path}")]
    Unstable {
        path: PathBuf,
    },

    /// The artifact failed soft-validation twice.
    #[error("Export output failed validation ({reason}): {path}")]
    SoftValidation {
        path: PathBuf,
        reason: String,
    },

    /// Publishing or queueing after a successful run failed.
    #[error("{0}")]
    Publish(#[from] AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Whether the run was ended by the timeout kill.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExportError::Timeout { .. })
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Publish(inner) => inner,
            ExportError::NotFound { .. } | ExportError::AppNotDiscovered => {
                AppError::not_found(err.to_string())
            }
            ExportError::Timeout { .. } => AppError::timeout(err.to_string()),
            ExportError::Unstable { .. } | ExportError::Io(_) => AppError::storage(err.to_string()),
            ExportError::SoftValidation { .. } => AppError::validation(err.to_string()),
            ExportError::Spawn { .. } | ExportError::NoOutput { .. } => {
                AppError::external_process(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_core::error::ErrorKind;

    #[test]
    fn test_maps_to_app_error_kinds() {
        let missing = ExportError::NotFound {
            what: "export script",
            path: PathBuf::from("/x/a.js"),
        };
        assert!(missing.to_string().starts_with("export script not found"));
        assert_eq!(AppError::from(missing).kind, ErrorKind::NotFound);

        let timeout: AppError = ExportError::Timeout { timeout_seconds: 120 }.into();
        assert_eq!(timeout.kind, ErrorKind::Timeout);

        let invalid: AppError = ExportError::SoftValidation {
            path: PathBuf::from("a.igs"),
            reason: "too small".into(),
        }
        .into();
        assert_eq!(invalid.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_publish_error_passes_through() {
        let err: AppError = ExportError::Publish(AppError::storage("disk full")).into();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert_eq!(err.message, "disk full");
    }
}
