//! Domain types shared across PanelSync crates.

pub mod artifact;
pub mod job;
pub mod meta;
pub mod stability;

pub use artifact::ArtifactFormat;
pub use job::{Job, JobAction, JobError, JobKind};
pub use meta::{ModelInfo, PanelMeta, SourceInfo};
pub use stability::StabilityPolicy;
