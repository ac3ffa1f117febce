//! File naming rules shared by producers and consumers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use panelsync_core::types::ArtifactFormat;

/// Local-filesystem friendly stamp, `yyyyMMdd-HHmmss`.
pub fn stamp(utc: DateTime<Utc>) -> String {
    utc.format("%Y%m%d-%H%M%S").to_string()
}

fn compact_utc(utc: DateTime<Utc>) -> String {
    utc.format("%Y%m%dT%H%M%SZ").to_string()
}

/// `{projectId}_{zone}_{yyyyMMddTHHmmssZ}.{ext}` for reference exports.
pub fn reference_name(
    project_id: &str,
    zone: &str,
    format: ArtifactFormat,
    utc: DateTime<Utc>,
) -> String {
    format!(
        "{project_id}_{zone}_{}.{}",
        compact_utc(utc),
        format.extension()
    )
}

/// `{projectGuid:N}_{panelId}_r{rev}_{yyyyMMddTHHmmssZ}.{ext}`.
pub fn panel_model_name(
    project_id: Uuid,
    panel_id: &str,
    rev: &str,
    ext: &str,
    utc: DateTime<Utc>,
) -> String {
    format!(
        "{}_{panel_id}_r{rev}_{}.{}",
        project_id.simple(),
        compact_utc(utc),
        ext.to_ascii_lowercase()
    )
}

/// Sidecar path for an artifact: `foo.obj` becomes `foo_meta.json`.
pub fn meta_for(artifact: &Path) -> PathBuf {
    let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{stem}_meta.json"))
}

/// Whether `path` is a sidecar metadata file.
pub fn is_meta_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase().ends_with("_meta.json"))
        .unwrap_or(false)
}

/// `job_{yyyyMMddTHHmmssfffZ}_{suffix}.json`.
pub fn job_file_name(utc: DateTime<Utc>, suffix: &str) -> String {
    format!("job_{}_{suffix}.json", utc.format("%Y%m%dT%H%M%S%3fZ"))
}

/// Restrict a caller-supplied name part to `[A-Za-z0-9_-]`, replacing
/// anything else with `_`. Empty input becomes `fallback`.
pub fn safe_component(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Deterministic mesh export path `{documentStem}_{panelId}_r{rev}.obj`.
///
/// Carries no timestamp so a fresh export overwrites the previous one.
/// Panel id and revision come from job files and are passed through
/// [`safe_component`], so the result always lands directly in `out_folder`.
pub fn mesh_export_path(out_folder: &Path, document: &Path, panel_id: &str, rev: &str) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let panel_id = safe_component(panel_id, "panel");
    let rev = safe_component(rev, "A");
    out_folder.join(format!("{stem}_{panel_id}_r{rev}.obj"))
}

/// File name without extension, used as the base name for derived files.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
