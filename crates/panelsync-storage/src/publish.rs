//! Artifact publisher.
//!
//! Publishes reference exports and panel models under
//! `<export_root>/exports/<format>` with atomic writes, and produces the
//! `_meta.json` sidecar for panel models.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use panelsync_core::error::AppError;
use panelsync_core::result::AppResult;
use panelsync_core::types::{ArtifactFormat, PanelMeta};

use crate::atomic::write_atomic;
use crate::hash::file_sha256;
use crate::hot_folders::ensure_folder;
use crate::naming;

/// Case-insensitive project id comparison; logs a warning on mismatch.
pub fn project_matches(expected: &str, incoming: &str) -> bool {
    let ok = expected.eq_ignore_ascii_case(incoming);
    if !ok {
        warn!(expected, incoming, "ProjectId mismatch");
    }
    ok
}

/// Publishes artifacts below one application's export root.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    export_root: PathBuf,
}

impl ArtifactPublisher {
    pub fn new(export_root: impl Into<PathBuf>) -> Self {
        Self {
            export_root: export_root.into(),
        }
    }

    pub fn export_root(&self) -> &Path {
        &self.export_root
    }

    /// Folder holding artifacts of `format`.
    pub fn format_dir(&self, format: ArtifactFormat) -> PathBuf {
        self.export_root.join("exports").join(format.folder())
    }

    /// Publish `bytes` as `file_name` in the folder for `format`.
    pub async fn save_named(
        &self,
        format: ArtifactFormat,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<PathBuf> {
        let dir = self.format_dir(format);
        ensure_folder(&dir).await?;
        let path = dir.join(file_name);
        info!(format = %format, path = %path.display(), "Publishing artifact");
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Publish a timestamped reference IGES.
    pub async fn save_ref_iges(&self, project_id: &str, zone: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        let name = naming::reference_name(project_id, zone, ArtifactFormat::Iges, Utc::now());
        self.save_named(ArtifactFormat::Iges, &name, bytes).await
    }

    /// Publish a timestamped reference DXF.
    pub async fn save_ref_dxf(&self, project_id: &str, zone: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        let name = naming::reference_name(project_id, zone, ArtifactFormat::Dxf, Utc::now());
        self.save_named(ArtifactFormat::Dxf, &name, bytes).await
    }

    /// Publish a panel model and its sidecar.
    ///
    /// `meta.project_id` must be a GUID. The model is written first, then
    /// hashed, then the sidecar is written, so the sidecar always describes a
    /// complete model.
    pub async fn save_panel_model(
        &self,
        meta: &mut PanelMeta,
        bytes: &[u8],
        ext: &str,
    ) -> AppResult<PathBuf> {
        let project = Uuid::parse_str(&meta.project_id).map_err(|_| {
            AppError::validation(format!("ProjectId is not a valid GUID: {}", meta.project_id))
        })?;

        let ext = ext.to_ascii_lowercase();
        let name = naming::panel_model_name(project, &meta.panel_id, &meta.rev, &ext, meta.exported_at_utc);
        let dir = self.export_root.join("exports").join(&ext);
        ensure_folder(&dir).await?;
        let model_path = dir.join(name);

        info!(path = %model_path.display(), panel = %meta.panel_id, "Exporting model");
        write_atomic(&model_path, bytes).await?;
        write_sidecar_meta(&model_path, meta).await?;
        Ok(model_path)
    }
}

/// Hash a model already on disk and write its `_meta.json` beside it.
pub async fn write_sidecar_meta(model_path: &Path, meta: &mut PanelMeta) -> AppResult<PathBuf> {
    meta.model.file = model_path.to_string_lossy().into_owned();
    meta.model.hash = file_sha256(model_path).await?;

    let meta_path = naming::meta_for(model_path);
    let json = serde_json::to_vec_pretty(meta)?;
    write_atomic(&meta_path, &json).await?;
    Ok(meta_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::string_sha256;

    #[tokio::test]
    async fn test_save_ref_iges_lands_in_iges_folder() {
        let root = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(root.path());

        let path = publisher.save_ref_iges("PROJ", "ZONEA", b"iges").await.unwrap();
        assert_eq!(path.parent().unwrap(), root.path().join("exports").join("iges"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("PROJ_ZONEA_"));
        assert!(name.ends_with("Z.igs"));
        assert_eq!(std::fs::read(&path).unwrap(), b"iges");
    }

    #[tokio::test]
    async fn test_save_panel_model_writes_sidecar() {
        let root = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(root.path());
        let project = Uuid::new_v4();
        let mut meta = PanelMeta::for_panel(project.to_string(), "P001", "A", "Cyclone 3DR", "2024");

        let model = publisher
            .save_panel_model(&mut meta, b"abc", "OBJ")
            .await
            .unwrap();

        assert!(model.to_string_lossy().contains(&project.simple().to_string()));
        assert_eq!(model.extension().unwrap(), "obj");
        let sidecar = naming::meta_for(&model);
        let parsed: PanelMeta =
            serde_json::from_slice(&std::fs::read(&sidecar).unwrap()).unwrap();
        assert_eq!(parsed.model.hash, string_sha256("abc"));
        assert_eq!(parsed.panel_id, "P001");
        assert_eq!(meta.model.hash, parsed.model.hash);
    }

    #[tokio::test]
    async fn test_save_panel_model_requires_guid() {
        let root = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(root.path());
        let mut meta = PanelMeta::for_panel("PROJ1", "P001", "A", "x", "y");

        let err = publisher
            .save_panel_model(&mut meta, b"abc", "obj")
            .await
            .unwrap_err();
        assert_eq!(err.kind, panelsync_core::error::ErrorKind::Validation);
        assert!(!root.path().join("exports").join("obj").exists());
    }

    #[test]
    fn test_project_matches_ignores_case() {
        assert!(project_matches("abc", "ABC"));
        assert!(!project_matches("abc", "abd"));
    }
}
