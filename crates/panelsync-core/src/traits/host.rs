//! Narrow capability interface onto the CAD host application.
//!
//! Job handlers only ever talk to the host through [`HostApplication`]. A
//! real binding wraps the vendor automation layer; tests and the bundled
//! agent use an in-memory implementation. Implementations serialize access
//! internally, so concurrent job workers may share one `Arc<dyn HostApplication>`.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Opaque handle to a document open in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Template used when the host creates a fresh document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Default part template.
    #[default]
    Part,
    /// Default assembly template.
    Assembly,
}

/// Length unit forced onto imported references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementUnit {
    #[default]
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "ft")]
    Foot,
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Millimeter => "mm",
            Self::Centimeter => "cm",
            Self::Meter => "m",
            Self::Inch => "in",
            Self::Foot => "ft",
        };
        f.write_str(s)
    }
}

/// Mesh tessellation quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshResolution {
    Low,
    Medium,
    #[default]
    High,
}

/// Options handed to the host's mesh translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshExportOptions {
    /// Export every solid body in the document.
    pub export_all_solids: bool,
    pub resolution: MeshResolution,
    /// Export surfaces as well as solids.
    pub include_surfaces: bool,
}

impl Default for MeshExportOptions {
    fn default() -> Self {
        Self {
            export_all_solids: true,
            resolution: MeshResolution::High,
            include_surfaces: false,
        }
    }
}

/// A reference component previously imported into a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedReference {
    /// Display name inside the host.
    pub name: String,
    /// File the reference was imported from.
    pub source_path: PathBuf,
}

impl ImportedReference {
    /// Whether this reference came from a file named like `artifact`.
    pub fn matches_file_name(&self, artifact: &Path) -> bool {
        match (self.source_path.file_name(), artifact.file_name()) {
            (Some(a), Some(b)) => a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy()),
            _ => false,
        }
    }
}

/// Case-insensitive path comparison with separators normalized.
pub fn same_document_path(a: &Path, b: &Path) -> bool {
    let norm = |p: &Path| p.to_string_lossy().replace('\\', "/").to_lowercase();
    norm(a) == norm(b)
}

/// Operations the job executor needs from the CAD host.
#[async_trait]
pub trait HostApplication: Send + Sync + 'static {
    /// Host name recorded as the source application in sidecar metadata.
    fn name(&self) -> &str;

    /// Host version string.
    fn version(&self) -> String;

    /// Find an already-open document by full path (case-insensitive).
    async fn find_open_document(&self, path: &Path) -> AppResult<Option<DocumentId>>;

    /// Open a document from disk.
    async fn open_document(&self, path: &Path) -> AppResult<DocumentId>;

    /// Create an unsaved document from a template.
    async fn create_document(&self, template: TemplateKind) -> AppResult<DocumentId>;

    /// Save a document under a new path.
    async fn save_as(&self, doc: DocumentId, path: &Path) -> AppResult<()>;

    /// Save a document in place.
    async fn save(&self, doc: DocumentId) -> AppResult<()>;

    /// Full path of a saved document.
    async fn document_path(&self, doc: DocumentId) -> AppResult<Option<PathBuf>>;

    /// References currently imported into the document.
    async fn imported_references(&self, doc: DocumentId) -> AppResult<Vec<ImportedReference>>;

    /// Delete an imported reference.
    async fn remove_reference(&self, doc: DocumentId, reference: &ImportedReference)
    -> AppResult<()>;

    /// Import `artifact` as a reference component using `units`.
    async fn import_reference(
        &self,
        doc: DocumentId,
        artifact: &Path,
        units: MeasurementUnit,
    ) -> AppResult<ImportedReference>;

    /// Whether the document contains at least one solid body.
    async fn has_solid_bodies(&self, doc: DocumentId) -> AppResult<bool>;

    /// Run the mesh translator into `out_path`.
    async fn export_mesh(
        &self,
        doc: DocumentId,
        options: &MeshExportOptions,
        out_path: &Path,
    ) -> AppResult<()>;

    /// Bring the document to the front of the host UI.
    async fn activate(&self, doc: DocumentId) -> AppResult<()>;
}
