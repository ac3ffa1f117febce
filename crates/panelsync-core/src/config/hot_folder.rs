//! Hot folder layout configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the hot folder root created under the user's desktop.
pub const HOT_FOLDER_NAME: &str = "PanelSyncHot";

/// Hot folder configuration.
///
/// Only the root is configurable; every other directory is derived from it
/// so both processes agree on the layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotFolderConfig {
    /// Root of the hot folder set.
    pub root: PathBuf,
}

impl Default for HotFolderConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(HOT_FOLDER_NAME)
}

impl HotFolderConfig {
    /// Create a configuration rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Job mailbox directory.
    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("Jobs")
    }

    /// Rolling log directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Export root of the surveying tool (`exports/<fmt>` lives below it).
    pub fn surveying_export_root(&self) -> PathBuf {
        self.root.join("3DR")
    }

    /// Export root of the CAD modeler.
    pub fn cad_export_root(&self) -> PathBuf {
        self.root.join("Inventor")
    }

    /// IGES artifacts produced by the surveying tool.
    pub fn iges_dir(&self) -> PathBuf {
        self.surveying_export_root().join("exports").join("iges")
    }

    /// DXF artifacts produced by the surveying tool.
    pub fn dxf_dir(&self) -> PathBuf {
        self.surveying_export_root().join("exports").join("dxf")
    }

    /// OBJ meshes produced by the CAD modeler.
    pub fn obj_dir(&self) -> PathBuf {
        self.cad_export_root().join("exports").join("obj")
    }

    /// CAD documents created on behalf of the surveying tool.
    pub fn projects_dir(&self) -> PathBuf {
        self.cad_export_root().join("Projects")
    }

    /// Import script regenerated for every new OBJ mesh.
    pub fn latest_obj_script(&self) -> PathBuf {
        self.root.join("latest_obj.js")
    }

    /// Every directory that must exist before a producer or consumer runs.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.jobs_dir(),
            self.logs_dir(),
            self.iges_dir(),
            self.dxf_dir(),
            self.obj_dir(),
            self.projects_dir(),
        ]
    }
}
