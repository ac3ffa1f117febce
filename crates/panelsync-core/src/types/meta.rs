//! Sidecar metadata written beside exported panel models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `<model>_meta.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PanelMeta {
    pub project_id: String,
    pub panel_id: String,
    pub rev: String,
    pub author: String,
    pub units: String,
    pub source: SourceInfo,
    pub model: ModelInfo,
    #[serde(rename = "BBoxMin")]
    pub bbox_min: [f64; 3],
    #[serde(rename = "BBoxMax")]
    pub bbox_max: [f64; 3],
    pub notes: String,
    pub exported_at_utc: DateTime<Utc>,
}

/// Application that produced the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceInfo {
    pub app: String,
    pub version: String,
}

/// Model file path and content hash, filled in once the model is on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModelInfo {
    pub file: String,
    pub hash: String,
}

impl Default for PanelMeta {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            panel_id: String::new(),
            rev: "A".to_string(),
            author: String::new(),
            units: "mm".to_string(),
            source: SourceInfo::default(),
            model: ModelInfo::default(),
            bbox_min: [0.0; 3],
            bbox_max: [0.0; 3],
            notes: String::new(),
            exported_at_utc: Utc::now(),
        }
    }
}

impl PanelMeta {
    /// Metadata for a panel exported by `app`.
    pub fn for_panel(
        project_id: impl Into<String>,
        panel_id: impl Into<String>,
        rev: impl Into<String>,
        app: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            panel_id: panel_id.into(),
            rev: rev.into(),
            source: SourceInfo {
                app: app.into(),
                version: version.into(),
            },
            ..Default::default()
        }
    }
}
