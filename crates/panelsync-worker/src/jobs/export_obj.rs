//! `ExportPanelAsOBJ`: mesh-export a document that is open in the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};

use panelsync_core::error::AppError;
use panelsync_core::traits::{HostApplication, MeshExportOptions};
use panelsync_core::types::{Job, JobAction, JobKind, PanelMeta};
use panelsync_storage::naming::mesh_export_path;
use panelsync_storage::publish::write_sidecar_meta;

use crate::executor::{JobExecutionError, JobHandler, JobOutcome};

const DEFAULT_REV: &str = "A";

#[derive(Clone)]
pub struct ExportObjHandler {
    host: Arc<dyn HostApplication>,
    options: MeshExportOptions,
}

impl std::fmt::Debug for ExportObjHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportObjHandler")
            .field("host", &self.host.name())
            .field("options", &self.options)
            .finish()
    }
}

impl ExportObjHandler {
    pub fn new(host: Arc<dyn HostApplication>, options: MeshExportOptions) -> Self {
        Self { host, options }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Set the modification time to now; some translators keep the old one.
async fn touch(path: &Path) -> Result<(), AppError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&owned)?
            .set_modified(SystemTime::now())
    })
    .await
    .map_err(|e| AppError::internal(format!("touch task failed: {e}")))??;
    Ok(())
}

#[async_trait]
impl JobHandler for ExportObjHandler {
    fn kind(&self) -> JobKind {
        JobKind::ExportObj
    }

    #[instrument(skip(self, job), fields(correlation_id = job.correlation_id.as_deref().unwrap_or("")))]
    async fn execute(&self, job: &Job) -> Result<JobOutcome, JobExecutionError> {
        let JobAction::ExportObj {
            ipt_path,
            out_folder,
            panel_id,
            rev,
        } = &job.action
        else {
            return Err(JobExecutionError::WrongKind(self.kind()));
        };
        let ipt = PathBuf::from(ipt_path);

        let Some(doc) = self
            .host
            .find_open_document(&ipt)
            .await
            .map_err(JobExecutionError::host)?
        else {
            warn!(document = %ipt.display(), "Document is not open, skipping OBJ export");
            return Ok(JobOutcome::Skipped("document not open".into()));
        };

        if !self
            .host
            .has_solid_bodies(doc)
            .await
            .map_err(JobExecutionError::host)?
        {
            warn!(document = %ipt.display(), "Document has no solid bodies, skipping OBJ export");
            return Ok(JobOutcome::Skipped("no solid bodies".into()));
        }

        let stem = ipt
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let panel = non_blank(panel_id.as_ref()).unwrap_or(&stem).to_string();
        let rev = non_blank(rev.as_ref()).unwrap_or(DEFAULT_REV).to_string();

        let out_dir = PathBuf::from(out_folder);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| JobExecutionError::Internal(e.into()))?;
        let out_path = mesh_export_path(&out_dir, &ipt, &panel, &rev);

        self.host
            .export_mesh(doc, &self.options, &out_path)
            .await
            .map_err(JobExecutionError::host)?;
        touch(&out_path).await?;

        let mut meta = PanelMeta::for_panel(
            job.project_id.clone().unwrap_or_default(),
            panel,
            rev,
            self.host.name(),
            self.host.version(),
        );
        meta.exported_at_utc = Utc::now();
        write_sidecar_meta(&out_path, &mut meta).await?;

        info!(path = %out_path.display(), "OBJ export complete");
        Ok(JobOutcome::Completed)
    }
}
