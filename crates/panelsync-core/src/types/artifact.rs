//! Interchange artifact formats.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Interchange geometry formats exchanged through the hot folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// IGES curve network exported by the surveying tool.
    Iges,
    /// DXF reference exported by the surveying tool.
    Dxf,
    /// OBJ mesh exported by the CAD modeler.
    Obj,
}

impl ArtifactFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Iges => "igs",
            Self::Dxf => "dxf",
            Self::Obj => "obj",
        }
    }

    /// Folder name under `exports/`.
    pub fn folder(self) -> &'static str {
        match self {
            Self::Iges => "iges",
            Self::Dxf => "dxf",
            Self::Obj => "obj",
        }
    }

    /// Infer the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "igs" | "iges" => Some(Self::Iges),
            "dxf" => Some(Self::Dxf),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iges => write!(f, "IGES"),
            Self::Dxf => write!(f, "DXF"),
            Self::Obj => write!(f, "OBJ"),
        }
    }
}
