//! Export script resolution and `--ScriptParam` encoding.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ExportError;

/// Group exported when none is configured.
pub const DEFAULT_GROUP_PATH: &str = "/Geometric Group";

/// Entity types passed to the DXF script.
pub const DXF_FILTER_TYPES: &str = "SLine,SCircle,SPolyline";

/// Which entities the export script should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Every item in the project.
    #[default]
    All,
    /// Only the currently visible items.
    VisibleOnly,
}

impl ExportMode {
    fn flag(self) -> &'static str {
        match self {
            ExportMode::All => "1",
            ExportMode::VisibleOnly => "0",
        }
    }
}

/// Path with backslashes turned into forward slashes, as the scripting
/// environment expects.
pub fn script_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Absolute group path; empty names fall back to [`DEFAULT_GROUP_PATH`].
pub fn group_path(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_GROUP_PATH.to_string()
    } else if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Ordered `key=value;` assignments consumed by the export script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptParams {
    entries: Vec<(String, String)>,
}

impl ScriptParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-quoted string assignment.
    pub fn quoted(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.entries
            .push((key.to_string(), format!("'{}'", value.as_ref().replace('\'', "\\'"))));
        self
    }

    /// Add a path assignment, normalized to forward slashes.
    pub fn path(self, key: &str, value: &Path) -> Self {
        self.quoted(key, script_path(value))
    }

    /// Add an unquoted assignment.
    pub fn raw(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    /// Add the `exportAll` flag.
    pub fn mode(self, mode: ExportMode) -> Self {
        self.raw("exportAll", mode.flag())
    }

    /// Append every entry of `other`.
    pub fn extend(mut self, other: &ScriptParams) -> Self {
        self.entries.extend(other.entries.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ScriptParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value};")?;
            first = false;
        }
        Ok(())
    }
}

/// Resolve `name` against the configured scripts folder and the install
/// folder of the export application.
///
/// Candidates, first existing wins: `<scripts_dir>/<name>`,
/// `<exe dir>/Scripts/<name>`, `<exe dir>/<name>`.
pub fn resolve_script(
    name: &str,
    scripts_dir: Option<&Path>,
    app: &Path,
) -> Result<PathBuf, ExportError> {
    let exe_dir = app.parent().unwrap_or_else(|| Path::new("."));
    let mut candidates = Vec::with_capacity(3);
    if let Some(dir) = scripts_dir {
        candidates.push(dir.join(name));
    }
    candidates.push(exe_dir.join("Scripts").join(name));
    candidates.push(exe_dir.join(name));

    for candidate in &candidates {
        if candidate.is_file() {
            debug!(script = %candidate.display(), "Resolved export script");
            return Ok(candidate.clone());
        }
    }

    Err(ExportError::NotFound {
        what: "export script",
        path: candidates.swap_remove(0),
    })
}
