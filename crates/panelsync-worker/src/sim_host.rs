//! In-memory CAD host.
//!
//! Implements [`HostApplication`] without any vendor automation layer. Saved
//! documents are small JSON files listing their imported references, and
//! mesh exports write a tiny but well-formed OBJ. Every call is recorded so
//! tests can assert on the exact sequence of host operations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use panelsync_core::error::AppError;
use panelsync_core::result::AppResult;
use panelsync_core::traits::host::same_document_path;
use panelsync_core::traits::{
    DocumentId, HostApplication, ImportedReference, MeasurementUnit, MeshExportOptions,
    TemplateKind,
};

const SIM_NAME: &str = "Autodesk Inventor (simulated)";
const SIM_VERSION: &str = "2025";

const MESH_BODY: &str = "# simulated mesh export\n\
o panel\n\
v 0 0 0\nv 1000 0 0\nv 1000 500 0\nv 0 500 0\n\
f 1 2 3\nf 1 3 4\n";

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    FindOpen(PathBuf),
    Open(PathBuf),
    Create(TemplateKind),
    SaveAs(DocumentId, PathBuf),
    Save(DocumentId),
    RemoveReference(DocumentId, String),
    ImportReference(DocumentId, PathBuf, MeasurementUnit),
    ExportMesh(DocumentId, PathBuf),
    Activate(DocumentId),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SavedDocument {
    references: Vec<ImportedReference>,
    has_solids: bool,
}

#[derive(Debug, Clone, Default)]
struct SimDocument {
    path: Option<PathBuf>,
    references: Vec<ImportedReference>,
    has_solids: bool,
    imports: u32,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    documents: HashMap<DocumentId, SimDocument>,
    active: Option<DocumentId>,
    calls: Vec<HostCall>,
    mesh_mtime: Option<SystemTime>,
}

impl SimState {
    fn insert(&mut self, doc: SimDocument) -> DocumentId {
        self.next_id += 1;
        let id = DocumentId(self.next_id);
        self.documents.insert(id, doc);
        id
    }

    fn document(&mut self, id: DocumentId) -> AppResult<&mut SimDocument> {
        self.documents
            .get_mut(&id)
            .ok_or_else(|| AppError::host(format!("{id} is not open")))
    }
}

/// Simulated host application.
#[derive(Debug, Default)]
pub struct SimulatedHost {
    state: Mutex<SimState>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> AppResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::internal("simulated host state poisoned"))?;
        Ok(f(&mut state))
    }

    /// Mark `path` as open in the host, as if the user had opened it.
    pub fn open_in_session(&self, path: impl Into<PathBuf>, has_solids: bool) -> AppResult<DocumentId> {
        let path = path.into();
        self.with_state(|s| {
            s.insert(SimDocument {
                path: Some(path),
                has_solids,
                ..Default::default()
            })
        })
    }

    /// Stamp every exported mesh with `mtime`, like a translator that keeps
    /// the source document's timestamp.
    pub fn keep_mesh_mtime(&self, mtime: SystemTime) -> AppResult<()> {
        self.with_state(|s| s.mesh_mtime = Some(mtime))
    }

    /// Every host call so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.with_state(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn active_document(&self) -> Option<DocumentId> {
        self.with_state(|s| s.active).ok().flatten()
    }

    pub fn open_documents(&self) -> Vec<(DocumentId, Option<PathBuf>)> {
        self.with_state(|s| {
            let mut docs: Vec<_> = s.documents.iter().map(|(id, d)| (*id, d.path.clone())).collect();
            docs.sort_by_key(|(id, _)| id.0);
            docs
        })
        .unwrap_or_default()
    }

    pub fn references(&self, doc: DocumentId) -> Vec<ImportedReference> {
        self.with_state(|s| {
            s.documents
                .get(&doc)
                .map(|d| d.references.clone())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    fn record(&self, call: HostCall) -> AppResult<()> {
        debug!(?call, "Simulated host call");
        self.with_state(|s| s.calls.push(call))
    }

    async fn persist(&self, doc: DocumentId, path: &Path) -> AppResult<()> {
        let saved = self.with_state(|s| {
            s.document(doc).map(|d| SavedDocument {
                references: d.references.clone(),
                has_solids: d.has_solids,
            })
        })??;
        tokio::fs::write(path, serde_json::to_vec_pretty(&saved)?).await?;
        Ok(())
    }
}

#[async_trait]
impl HostApplication for SimulatedHost {
    fn name(&self) -> &str {
        SIM_NAME
    }

    fn version(&self) -> String {
        SIM_VERSION.to_string()
    }

    async fn find_open_document(&self, path: &Path) -> AppResult<Option<DocumentId>> {
        self.record(HostCall::FindOpen(path.to_path_buf()))?;
        self.with_state(|s| {
            s.documents
                .iter()
                .filter(|(_, d)| d.path.as_deref().is_some_and(|p| same_document_path(p, path)))
                .map(|(id, _)| *id)
                .min_by_key(|id| id.0)
        })
    }

    async fn open_document(&self, path: &Path) -> AppResult<DocumentId> {
        self.record(HostCall::Open(path.to_path_buf()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| AppError::not_found(format!("Document not found: {}", path.display())))?;
        let saved: SavedDocument = serde_json::from_slice(&bytes).unwrap_or_default();
        self.with_state(|s| {
            s.insert(SimDocument {
                path: Some(path.to_path_buf()),
                references: saved.references,
                has_solids: saved.has_solids,
                imports: 0,
            })
        })
    }

    async fn create_document(&self, template: TemplateKind) -> AppResult<DocumentId> {
        self.record(HostCall::Create(template))?;
        self.with_state(|s| s.insert(SimDocument::default()))
    }

    async fn save_as(&self, doc: DocumentId, path: &Path) -> AppResult<()> {
        self.record(HostCall::SaveAs(doc, path.to_path_buf()))?;
        self.persist(doc, path).await?;
        self.with_state(|s| s.document(doc).map(|d| d.path = Some(path.to_path_buf())))?
    }

    async fn save(&self, doc: DocumentId) -> AppResult<()> {
        self.record(HostCall::Save(doc))?;
        let path = self
            .with_state(|s| s.document(doc).map(|d| d.path.clone()))??
            .ok_or_else(|| AppError::host(format!("{doc} has never been saved")))?;
        self.persist(doc, &path).await
    }

    async fn document_path(&self, doc: DocumentId) -> AppResult<Option<PathBuf>> {
        self.with_state(|s| s.document(doc).map(|d| d.path.clone()))?
    }

    async fn imported_references(&self, doc: DocumentId) -> AppResult<Vec<ImportedReference>> {
        self.with_state(|s| s.document(doc).map(|d| d.references.clone()))?
    }

    async fn remove_reference(
        &self,
        doc: DocumentId,
        reference: &ImportedReference,
    ) -> AppResult<()> {
        self.record(HostCall::RemoveReference(doc, reference.name.clone()))?;
        self.with_state(|s| {
            s.document(doc)
                .map(|d| d.references.retain(|r| r.name != reference.name))
        })?
    }

    async fn import_reference(
        &self,
        doc: DocumentId,
        artifact: &Path,
        units: MeasurementUnit,
    ) -> AppResult<ImportedReference> {
        self.record(HostCall::ImportReference(doc, artifact.to_path_buf(), units))?;
        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(AppError::not_found(format!(
                "Artifact not found: {}",
                artifact.display()
            )));
        }
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with_state(|s| {
            s.document(doc).map(|d| {
                d.imports += 1;
                let reference = ImportedReference {
                    name: format!("{stem}:{}", d.imports),
                    source_path: artifact.to_path_buf(),
                };
                d.references.push(reference.clone());
                reference
            })
        })?
    }

    async fn has_solid_bodies(&self, doc: DocumentId) -> AppResult<bool> {
        self.with_state(|s| s.document(doc).map(|d| d.has_solids))?
    }

    async fn export_mesh(
        &self,
        doc: DocumentId,
        _options: &MeshExportOptions,
        out_path: &Path,
    ) -> AppResult<()> {
        self.record(HostCall::ExportMesh(doc, out_path.to_path_buf()))?;
        self.with_state(|s| s.document(doc).map(|_| ()))??;
        tokio::fs::write(out_path, MESH_BODY).await?;
        if let Some(mtime) = self.with_state(|s| s.mesh_mtime)? {
            std::fs::File::options()
                .write(true)
                .open(out_path)?
                .set_modified(mtime)?;
        }
        Ok(())
    }

    async fn activate(&self, doc: DocumentId) -> AppResult<()> {
        self.record(HostCall::Activate(doc))?;
        self.with_state(|s| {
            s.document(doc)?;
            s.active = Some(doc);
            Ok::<(), AppError>(())
        })?
    }
}
