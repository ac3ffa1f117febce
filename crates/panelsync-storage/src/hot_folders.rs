//! The hot folder directory set.

use std::path::{Path, PathBuf};

use tracing::info;

use panelsync_core::config::HotFolderConfig;
use panelsync_core::error::{AppError, ErrorKind};
use panelsync_core::result::AppResult;

/// Create `path` if it does not exist. Returns `true` when it was created.
pub async fn ensure_folder(path: &Path) -> AppResult<bool> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to create folder: {}", path.display()),
            e,
        )
    })?;
    info!(path = %path.display(), "Created folder");
    Ok(true)
}

/// Well-known directories shared by the producer and the consumer.
#[derive(Debug, Clone)]
pub struct HotFolderSet {
    layout: HotFolderConfig,
}

impl HotFolderSet {
    pub fn new(layout: HotFolderConfig) -> Self {
        Self { layout }
    }

    /// Derived directory layout.
    pub fn layout(&self) -> &HotFolderConfig {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.layout.jobs_dir()
    }

    /// Create every directory of the set. Idempotent.
    ///
    /// Returns the directories that did not exist before.
    pub async fn ensure(&self) -> AppResult<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in self.layout.all_dirs() {
            if ensure_folder(&dir).await? {
                created.push(dir);
            }
        }
        Ok(created)
    }
}
