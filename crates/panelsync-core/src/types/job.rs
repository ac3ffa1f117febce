//! Job descriptors exchanged through the `Jobs/` hot folder.
//!
//! A job file holds one JSON object. The `Kind` field selects the variant and
//! the whole body is decoded in a single pass into [`Job`]; per-variant
//! required fields are then checked by [`Job::validate`].

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

/// Reasons a job file is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// The body is not a JSON object of the expected shape.
    #[error("Malformed job: {0}")]
    Malformed(String),

    /// `Kind` is absent from the closed set of job kinds.
    #[error("Unrecognized job kind")]
    UnknownKind,

    /// A field required by the declared kind is missing or blank.
    #[error("{kind} job is missing required field {field}")]
    MissingField {
        /// Declared kind.
        kind: JobKind,
        /// Wire name of the missing field.
        field: &'static str,
    },

    /// The job was stamped for a different project.
    #[error("Job targets project {actual}, expected {expected}")]
    ProjectMismatch {
        /// Project id the consumer is bound to.
        expected: String,
        /// Project id carried by the job.
        actual: String,
    },
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        AppError::with_source(ErrorKind::Validation, err.to_string(), err)
    }
}

/// Recognized job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Open or create a CAD document and import an IGES reference into it.
    ImportIges,
    /// Export an open CAD document as an OBJ mesh.
    ExportObj,
}

impl JobKind {
    /// Wire discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImportIges => "OpenOrCreateAndImportIGES",
            Self::ExportObj => "ExportPanelAsOBJ",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific body of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum JobAction {
    #[serde(rename = "OpenOrCreateAndImportIGES", rename_all = "PascalCase")]
    ImportIges {
        #[serde(default)]
        ipt_path: String,
        #[serde(default)]
        iges_path: String,
    },

    #[serde(rename = "ExportPanelAsOBJ", rename_all = "PascalCase")]
    ExportObj {
        #[serde(default)]
        ipt_path: String,
        #[serde(default)]
        out_folder: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        panel_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rev: Option<String>,
    },

    /// Any `Kind` value outside the closed set.
    #[serde(other)]
    Unknown,
}

/// A job descriptor as stored in a `job_*.json` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(flatten)]
    pub action: JobAction,

    /// Focus the affected document after execution.
    #[serde(default = "default_bring_to_front")]
    pub bring_to_front: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Free-form id used to cross-reference log lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Informational; unparseable values decode as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_utc: Option<DateTime<Utc>>,
}

fn default_bring_to_front() -> bool {
    true
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl Job {
    fn with_action(action: JobAction) -> Self {
        Self {
            action,
            bring_to_front: true,
            project_id: None,
            correlation_id: Some(uuid::Uuid::new_v4().simple().to_string()),
            created_utc: Some(Utc::now()),
        }
    }

    /// New import job for `iges_path` into `ipt_path`.
    pub fn import_iges(ipt_path: impl Into<String>, iges_path: impl Into<String>) -> Self {
        Self::with_action(JobAction::ImportIges {
            ipt_path: ipt_path.into(),
            iges_path: iges_path.into(),
        })
    }

    /// New mesh export job for `ipt_path` into `out_folder`.
    pub fn export_obj(
        ipt_path: impl Into<String>,
        out_folder: impl Into<String>,
        panel_id: impl Into<String>,
        rev: impl Into<String>,
    ) -> Self {
        Self::with_action(JobAction::ExportObj {
            ipt_path: ipt_path.into(),
            out_folder: out_folder.into(),
            panel_id: Some(panel_id.into()),
            rev: Some(rev.into()),
        })
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_bring_to_front(mut self, bring_to_front: bool) -> Self {
        self.bring_to_front = bring_to_front;
        self
    }

    /// Declared kind, or `None` for an unrecognized discriminator.
    pub fn kind(&self) -> Option<JobKind> {
        match self.action {
            JobAction::ImportIges { .. } => Some(JobKind::ImportIges),
            JobAction::ExportObj { .. } => Some(JobKind::ExportObj),
            JobAction::Unknown => None,
        }
    }

    /// Target CAD document path.
    pub fn target_document(&self) -> Option<PathBuf> {
        match &self.action {
            JobAction::ImportIges { ipt_path, .. } | JobAction::ExportObj { ipt_path, .. } => {
                Some(PathBuf::from(ipt_path))
            }
            JobAction::Unknown => None,
        }
    }

    /// Decode and validate a job body.
    pub fn parse(bytes: &[u8]) -> Result<Self, JobError> {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let job: Job =
            serde_json::from_slice(body).map_err(|e| JobError::Malformed(e.to_string()))?;
        job.validate()?;
        Ok(job)
    }

    /// Check that the kind is recognized and its required paths are present.
    pub fn validate(&self) -> Result<(), JobError> {
        match &self.action {
            JobAction::ImportIges {
                ipt_path,
                iges_path,
            } => {
                if is_blank(ipt_path) {
                    return Err(JobError::MissingField {
                        kind: JobKind::ImportIges,
                        field: "IptPath",
                    });
                }
                if is_blank(iges_path) {
                    return Err(JobError::MissingField {
                        kind: JobKind::ImportIges,
                        field: "IgesPath",
                    });
                }
                Ok(())
            }
            JobAction::ExportObj {
                ipt_path,
                out_folder,
                ..
            } => {
                if is_blank(ipt_path) {
                    return Err(JobError::MissingField {
                        kind: JobKind::ExportObj,
                        field: "IptPath",
                    });
                }
                if is_blank(out_folder) {
                    return Err(JobError::MissingField {
                        kind: JobKind::ExportObj,
                        field: "OutFolder",
                    });
                }
                Ok(())
            }
            JobAction::Unknown => Err(JobError::UnknownKind),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Reject the job if it is stamped for a project other than `expected`.
    ///
    /// Jobs without a project id are accepted.
    pub fn check_project(&self, expected: &str) -> Result<(), JobError> {
        match self.project_id.as_deref() {
            Some(actual) if !actual.trim().eq_ignore_ascii_case(expected.trim()) => {
                Err(JobError::ProjectMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Indented JSON body.
    pub fn to_json(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
