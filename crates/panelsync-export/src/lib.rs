//! # panelsync-export
//!
//! Producer side of the hot folder handoff. Drives the surveying
//! application's scripted exports, infers completion from the artifact on
//! disk, publishes results and queues jobs for the CAD side.
//!
//! ## Architecture
//!
//! - **Discovery**: locates the export application executable
//! - **Script**: resolves export scripts and encodes `--ScriptParam`
//! - **Driver**: spawns the application, polls for a stable artifact,
//!   enforces the timeout with a process tree kill, soft-validates the result
//! - **Pipeline**: export, publish and enqueue for IGES, DXF and OBJ flows
//! - **OBJ inbox**: turns meshes exported by the CAD side into an import
//!   script for the surveying application

pub mod discovery;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod obj_inbox;
pub mod pipeline;
pub mod script;

pub use discovery::{ExportAppDiscovery, ExportAppInstallation};
pub use driver::{ExportDriver, ExportRequest};
pub use error::ExportError;
pub use obj_inbox::ObjInbox;
pub use pipeline::ReferenceExportPipeline;
pub use script::{ExportMode, ScriptParams};
