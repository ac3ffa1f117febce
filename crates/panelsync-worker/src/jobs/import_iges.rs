//! `OpenOrCreateAndImportIGES`: bring an IGES reference into a CAD document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use panelsync_core::traits::{DocumentId, HostApplication, MeasurementUnit, TemplateKind};
use panelsync_core::types::{ArtifactFormat, Job, JobAction, JobKind, StabilityPolicy};
use panelsync_storage::{soft_validate, wait_until_stable};

use crate::executor::{JobExecutionError, JobHandler, JobOutcome};

/// Imports the job's IGES file into the target document, creating the
/// document first when it exists neither in the session nor on disk.
#[derive(Clone)]
pub struct ImportIgesHandler {
    host: Arc<dyn HostApplication>,
    artifact_policy: StabilityPolicy,
    units: MeasurementUnit,
}

impl std::fmt::Debug for ImportIgesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportIgesHandler")
            .field("host", &self.host.name())
            .field("units", &self.units)
            .finish()
    }
}

impl ImportIgesHandler {
    pub fn new(
        host: Arc<dyn HostApplication>,
        artifact_policy: StabilityPolicy,
        units: MeasurementUnit,
    ) -> Self {
        Self {
            host,
            artifact_policy,
            units,
        }
    }

    /// Open document for `path`, opening or creating it as needed.
    async fn resolve_document(&self, path: &Path) -> Result<DocumentId, JobExecutionError> {
        if let Some(doc) = self
            .host
            .find_open_document(path)
            .await
            .map_err(JobExecutionError::host)?
        {
            return Ok(doc);
        }

        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!(path = %path.display(), "Opening document");
            return self
                .host
                .open_document(path)
                .await
                .map_err(JobExecutionError::host);
        }

        info!(path = %path.display(), "Creating document");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| JobExecutionError::Internal(e.into()))?;
        }
        let doc = self
            .host
            .create_document(TemplateKind::Part)
            .await
            .map_err(JobExecutionError::host)?;
        self.host
            .save_as(doc, path)
            .await
            .map_err(JobExecutionError::host)?;
        Ok(doc)
    }
}

#[async_trait]
impl JobHandler for ImportIgesHandler {
    fn kind(&self) -> JobKind {
        JobKind::ImportIges
    }

    #[instrument(skip(self, job), fields(correlation_id = job.correlation_id.as_deref().unwrap_or("")))]
    async fn execute(&self, job: &Job) -> Result<JobOutcome, JobExecutionError> {
        let JobAction::ImportIges {
            ipt_path,
            iges_path,
        } = &job.action
        else {
            return Err(JobExecutionError::WrongKind(self.kind()));
        };
        let ipt = PathBuf::from(ipt_path);
        let iges = PathBuf::from(iges_path);

        if !wait_until_stable(&iges, self.artifact_policy).await {
            return Err(JobExecutionError::ArtifactNotReady { path: iges });
        }
        let format = ArtifactFormat::from_path(&iges).unwrap_or(ArtifactFormat::Iges);
        let report = soft_validate(&iges, format).await;
        if !report.ok {
            warn!(path = %iges.display(), reason = %report.reason, "Importing artifact that failed soft validation");
        }

        let doc = self.resolve_document(&ipt).await?;

        let existing = self
            .host
            .imported_references(doc)
            .await
            .map_err(JobExecutionError::host)?;
        for stale in existing.iter().filter(|r| r.matches_file_name(&iges)) {
            info!(reference = %stale.name, "Removing previous import");
            self.host
                .remove_reference(doc, stale)
                .await
                .map_err(JobExecutionError::host)?;
        }

        let reference = self
            .host
            .import_reference(doc, &iges, self.units)
            .await
            .map_err(JobExecutionError::host)?;
        self.host.save(doc).await.map_err(JobExecutionError::host)?;

        if job.bring_to_front {
            self.host.activate(doc).await.map_err(JobExecutionError::host)?;
        }

        info!(
            document = %ipt.display(),
            artifact = %iges.display(),
            reference = %reference.name,
            "IGES import complete"
        );
        Ok(JobOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_host::{HostCall, SimulatedHost};

    fn quick() -> StabilityPolicy {
        StabilityPolicy::from_millis(50, 20, 2000)
    }

    fn handler(host: &Arc<SimulatedHost>) -> ImportIgesHandler {
        ImportIgesHandler::new(host.clone(), quick(), MeasurementUnit::Millimeter)
    }

    #[tokio::test]
    async fn test_creates_saves_imports_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        let ipt = dir.path().join("proj").join("part.ipt");
        let iges = dir.path().join("proj").join("part.igs");
        std::fs::create_dir_all(iges.parent().unwrap()).unwrap();
        std::fs::write(&iges, b"not really iges").unwrap();

        let host = Arc::new(SimulatedHost::new());
        let job = Job::import_iges(ipt.to_string_lossy(), iges.to_string_lossy());
        let outcome = handler(&host).execute(&job).await.unwrap();
        assert_eq!(outcome, JobOutcome::Completed);

        let doc = DocumentId(1);
        assert_eq!(
            host.calls(),
            vec![
                HostCall::FindOpen(ipt.clone()),
                HostCall::Create(TemplateKind::Part),
                HostCall::SaveAs(doc, ipt.clone()),
                HostCall::ImportReference(doc, iges.clone(), MeasurementUnit::Millimeter),
                HostCall::Save(doc),
                HostCall::Activate(doc),
            ]
        );
        assert!(ipt.is_file());
        assert_eq!(host.active_document(), Some(doc));
    }

    #[tokio::test]
    async fn test_reimport_replaces_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ipt = dir.path().join("part.ipt");
        let iges = dir.path().join("part.igs");
        std::fs::write(&iges, b"v1").unwrap();

        let host = Arc::new(SimulatedHost::new());
        let job = Job::import_iges(ipt.to_string_lossy(), iges.to_string_lossy())
            .with_bring_to_front(false);
        let handler = handler(&host);
        handler.execute(&job).await.unwrap();
        handler.execute(&job).await.unwrap();

        let doc = host.find_open_document(&ipt).await.unwrap().unwrap();
        let refs = host.references(doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "part:2");
        assert!(host.calls().contains(&HostCall::RemoveReference(doc, "part:1".into())));
        assert!(!host.calls().iter().any(|c| matches!(c, HostCall::Activate(_))));
    }

    #[tokio::test]
    async fn test_opens_existing_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let ipt = dir.path().join("part.ipt");
        let iges = dir.path().join("part.igs");
        std::fs::write(&ipt, b"{}").unwrap();
        std::fs::write(&iges, b"iges").unwrap();

        let host = Arc::new(SimulatedHost::new());
        let job = Job::import_iges(ipt.to_string_lossy(), iges.to_string_lossy());
        handler(&host).execute(&job).await.unwrap();

        assert_eq!(host.calls()[1], HostCall::Open(ipt.clone()));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(SimulatedHost::new());
        let job = Job::import_iges(
            dir.path().join("a.ipt").to_string_lossy(),
            dir.path().join("a.igs").to_string_lossy(),
        );

        let err = handler(&host).execute(&job).await.unwrap_err();
        assert!(matches!(err, JobExecutionError::ArtifactNotReady { .. }));
        assert!(host.calls().is_empty());
    }
}
