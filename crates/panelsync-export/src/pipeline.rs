//! Reference export pipeline.
//!
//! Exports geometry from a surveying document, publishes it into the hot
//! folder and queues the matching job for the CAD side.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use panelsync_core::config::{AppConfig, HotFolderConfig, ProjectConfig};
use panelsync_core::types::{ArtifactFormat, Job};
use panelsync_storage::validate::dxf;
use panelsync_storage::{ArtifactPublisher, JobQueue};

use crate::discovery::{ExportAppDiscovery, ExportAppInstallation};
use crate::driver::{ExportDriver, ExportRequest};
use crate::error::ExportError;
use crate::script::{group_path, resolve_script, ExportMode, ScriptParams, DXF_FILTER_TYPES};

/// Result of an IGES export handed to the CAD side.
#[derive(Debug, Clone, Serialize)]
pub struct IgesHandoff {
    /// Published `<iges dir>/<base>.igs`.
    pub artifact: PathBuf,
    /// CAD document the import job targets.
    pub document: PathBuf,
    /// Queued job file.
    pub job: PathBuf,
}

/// Result of a DXF reference export.
#[derive(Debug, Clone, Serialize)]
pub struct DxfReference {
    pub path: PathBuf,
    /// The export failed and a placeholder was published instead.
    pub stub: bool,
}

/// Producer-side export operations.
#[derive(Debug, Clone)]
pub struct ReferenceExportPipeline {
    driver: ExportDriver,
    layout: HotFolderConfig,
    project: ProjectConfig,
    queue: JobQueue,
}

fn base_name(source: &Path) -> Result<String, ExportError> {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ExportError::NotFound {
            what: "source document",
            path: source.to_path_buf(),
        })
}

impl ReferenceExportPipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            driver: ExportDriver::new(config.export.clone()),
            layout: config.hot_folder.clone(),
            project: config.project.clone(),
            queue: JobQueue::from_config(config.hot_folder.jobs_dir(), &config.watcher),
        }
    }

    pub fn driver(&self) -> &ExportDriver {
        &self.driver
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Locate the export application.
    pub fn installation(&self) -> Result<ExportAppInstallation, ExportError> {
        ExportAppDiscovery::discover(self.driver.config().explicit_app_path().map(PathBuf::as_path))
    }

    /// Run `script` against `source` into a private staging folder and return
    /// the artifact bytes.
    async fn export_to_bytes(
        &self,
        source: &Path,
        script: &str,
        format: ArtifactFormat,
        params: ScriptParams,
    ) -> Result<Vec<u8>, ExportError> {
        let base = base_name(source)?;
        let app = self.installation()?;
        let script = resolve_script(
            script,
            self.driver.config().explicit_scripts_dir().map(PathBuf::as_path),
            &app.executable,
        )?;

        let staging = std::env::temp_dir().join(format!("panelsync_{}", Uuid::new_v4().simple()));
        let request = ExportRequest {
            app: app.executable,
            script,
            source: source.to_path_buf(),
            output: staging.join(format!("{base}.{}", format.extension())),
            format,
            params,
        };

        let result = self.driver.run_export(&request).await;
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %staging.display(), error = %e, "Failed to clean up staging folder");
            }
        }
        result
    }

    /// Export IGES from `source`, publish it and queue the import job.
    pub async fn export_iges_to_host(
        &self,
        source: &Path,
        mode: ExportMode,
    ) -> Result<IgesHandoff, ExportError> {
        info!(source = %source.display(), ?mode, "Exporting IGES for the CAD side");
        let base = base_name(source)?;
        let bytes = self
            .export_to_bytes(
                source,
                &self.driver.config().iges_script,
                ArtifactFormat::Iges,
                ScriptParams::new().mode(mode),
            )
            .await?;

        let publisher = ArtifactPublisher::new(self.layout.surveying_export_root());
        let artifact = publisher
            .save_named(ArtifactFormat::Iges, &format!("{base}.igs"), &bytes)
            .await?;

        let document = self.layout.projects_dir().join(format!("{base}.ipt"));
        let job = Job::import_iges(
            document.to_string_lossy(),
            artifact.to_string_lossy(),
        )
        .with_project_id(&self.project.project_id)
        .with_bring_to_front(true);
        let job_path = self.queue.enqueue(&job, &base).await?;

        info!(
            artifact = %artifact.display(),
            document = %document.display(),
            "IGES handed to the CAD side"
        );
        Ok(IgesHandoff {
            artifact,
            document,
            job: job_path,
        })
    }

    /// Export the configured group as a timestamped reference DXF.
    ///
    /// When the export fails and stub fallback is enabled, a placeholder DXF
    /// is published so downstream steps still find a file.
    pub async fn export_dxf_reference(&self, source: &Path) -> Result<DxfReference, ExportError> {
        let params = ScriptParams::new()
            .quoted("groupPath", group_path(&self.project.group))
            .quoted("filterTypes", DXF_FILTER_TYPES);
        let exported = self
            .export_to_bytes(
                source,
                &self.driver.config().dxf_script,
                ArtifactFormat::Dxf,
                params,
            )
            .await;

        let (bytes, stub) = match exported {
            Ok(bytes) => (bytes, false),
            Err(e) if self.driver.config().dxf_stub_fallback => {
                warn!(error = %e, "DXF export failed, publishing stub");
                self.driver.metrics().record_stub_fallback();
                (dxf::stub(), true)
            }
            Err(e) => return Err(e),
        };

        let publisher = ArtifactPublisher::new(self.layout.surveying_export_root());
        let path = publisher
            .save_ref_dxf(&self.project.project_id, self.project.zone_or_group(), &bytes)
            .await?;
        Ok(DxfReference { path, stub })
    }

    /// Queue a mesh export of the CAD document that belongs to `source`.
    pub async fn queue_obj_export(
        &self,
        source: &Path,
        panel_id: &str,
        rev: &str,
    ) -> Result<PathBuf, ExportError> {
        let base = base_name(source)?;
        let document = self.layout.projects_dir().join(format!("{base}.ipt"));
        let job = Job::export_obj(
            document.to_string_lossy(),
            self.layout.obj_dir().to_string_lossy(),
            panel_id,
            rev,
        )
        .with_project_id(&self.project.project_id);

        let path = self.queue.enqueue(&job, &format!("{base}_OBJ")).await?;
        info!(document = %document.display(), "OBJ export queued");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_core::types::{JobAction, JobKind};

    fn config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.hot_folder = HotFolderConfig::at(root.join("PanelSyncHot"));
        config.project.project_id = "PROJ".to_string();
        config.export.app_path = root.join("missing").join("3DR.exe");
        config
    }

    #[tokio::test]
    async fn test_queue_obj_export_targets_projects_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let pipeline = ReferenceExportPipeline::new(&config);

        let path = pipeline
            .queue_obj_export(Path::new("/scans/site-04.3dr"), "P001", "A")
            .await
            .unwrap();
        assert!(path.to_string_lossy().ends_with("_site-04_OBJ.json"));

        let job = Job::parse(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(job.kind(), Some(JobKind::ExportObj));
        assert_eq!(job.project_id.as_deref(), Some("PROJ"));
        let JobAction::ExportObj { ipt_path, out_folder, .. } = job.action else {
            panic!("wrong action");
        };
        assert_eq!(
            PathBuf::from(ipt_path),
            config.hot_folder.projects_dir().join("site-04.ipt")
        );
        assert_eq!(PathBuf::from(out_folder), config.hot_folder.obj_dir());
    }

    #[tokio::test]
    async fn test_dxf_falls_back_to_stub() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let pipeline = ReferenceExportPipeline::new(&config);

        let reference = pipeline
            .export_dxf_reference(Path::new("/scans/site.3dr"))
            .await
            .unwrap();
        assert!(reference.stub);
        assert!(dxf::is_stub(&std::fs::read(&reference.path).unwrap()));
        assert_eq!(reference.path.parent().unwrap(), config.hot_folder.dxf_dir());
        assert_eq!(pipeline.driver().metrics_snapshot().stub_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_dxf_without_fallback_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.export.dxf_stub_fallback = false;
        let pipeline = ReferenceExportPipeline::new(&config);

        let err = pipeline
            .export_dxf_reference(Path::new("/scans/site.3dr"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::NotFound { what: "export application", .. }));
    }
}
