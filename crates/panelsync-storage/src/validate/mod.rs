//! Format soft-validators.
//!
//! Cheap structural sniffs that tell a genuine export apart from an empty or
//! truncated one. They never fail: any I/O problem turns into a negative
//! report carrying the error text.

pub mod dxf;
pub mod iges;
pub mod obj;

use std::fmt;
use std::path::Path;

use panelsync_core::types::ArtifactFormat;

/// Outcome of a soft validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub reason: String,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: "ok".to_string(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "ok")
        } else {
            write!(f, "failed: {}", self.reason)
        }
    }
}

/// Soft-validate `path` as `format`.
pub async fn soft_validate(path: &Path, format: ArtifactFormat) -> ValidationReport {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || match format {
        ArtifactFormat::Iges => iges::validate(&owned),
        ArtifactFormat::Dxf => dxf::validate(&owned),
        ArtifactFormat::Obj => obj::validate(&owned),
    })
    .await;

    match joined {
        Ok(report) => report,
        Err(e) => ValidationReport::fail(format!("exception: {e}")),
    }
}

fn file_len(path: &Path) -> Result<u64, ValidationReport> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| ValidationReport::fail(format!("exception: {e}")))
}
