//! Newest stable artifact lookup.

use std::path::{Path, PathBuf};

use tracing::debug;

use panelsync_core::result::AppResult;
use panelsync_core::types::{ArtifactFormat, StabilityPolicy};

use crate::atomic::is_temp_file;
use crate::stability::wait_until_stable;

/// Newest `{project_id}_*.{ext}` under `<export_root>/exports/<format>`.
///
/// Names embed a sortable UTC stamp, so the lexically greatest name is the
/// newest. The candidate is returned only once it is stable.
pub async fn latest_stable(
    export_root: &Path,
    project_id: &str,
    format: ArtifactFormat,
    policy: StabilityPolicy,
) -> AppResult<Option<PathBuf>> {
    let dir = export_root.join("exports").join(format.folder());
    let Some(candidate) = latest_candidate(&dir, project_id, format).await? else {
        return Ok(None);
    };

    debug!(path = %candidate.display(), "Latest candidate");
    if wait_until_stable(&candidate, policy).await {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

async fn latest_candidate(
    dir: &Path,
    project_id: &str,
    format: ArtifactFormat,
) -> AppResult<Option<PathBuf>> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(None);
    }

    let prefix = format!("{project_id}_");
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) || is_temp_file(&path) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && ArtifactFormat::from_path(&path) == Some(format) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names.pop().map(|name| dir.join(name)))
}
