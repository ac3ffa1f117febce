//! Capability traits implemented outside the core crate.

pub mod host;

pub use host::{
    DocumentId, HostApplication, ImportedReference, MeasurementUnit, MeshExportOptions,
    MeshResolution, TemplateKind,
};
