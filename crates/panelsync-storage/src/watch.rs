//! Non-recursive folder watcher built on `notify`.
//!
//! Filesystem notifications are filtered by file name and forwarded into a
//! tokio channel. Removals and the source half of renames are dropped; a
//! rename into the folder is reported under its new name.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use panelsync_core::error::AppError;
use panelsync_core::result::AppResult;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderEventKind {
    Created,
    Modified,
    Renamed,
}

/// A filtered filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEvent {
    pub path: PathBuf,
    pub kind: FolderEventKind,
}

/// Keeps the underlying OS watcher alive; dropping it stops notifications.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher").field("dir", &self.dir).finish()
    }
}

fn classify(event: &Event) -> Option<(FolderEventKind, Vec<PathBuf>)> {
    match &event.kind {
        EventKind::Create(_) => Some((FolderEventKind::Created, event.paths.clone())),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .last()
            .map(|to| (FolderEventKind::Renamed, vec![to.clone()])),
        EventKind::Modify(ModifyKind::Name(_)) => {
            Some((FolderEventKind::Renamed, event.paths.clone()))
        }
        EventKind::Modify(_) => Some((FolderEventKind::Modified, event.paths.clone())),
        _ => None,
    }
}

impl FolderWatcher {
    /// Watch `dir` (non-recursively) for files accepted by `filter`.
    pub fn watch<F>(dir: &Path, filter: F) -> AppResult<(Self, mpsc::UnboundedReceiver<FolderEvent>)>
    where
        F: Fn(&Path) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some((kind, paths)) = classify(&event) else {
                    return;
                };
                for path in paths {
                    if !filter(&path) {
                        continue;
                    }
                    debug!(path = %path.display(), ?kind, "Folder event");
                    if tx.send(FolderEvent { path, kind }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => error!(error = %e, "Watcher error"),
        })
        .map_err(|e| AppError::internal(format!("Failed to create folder watcher: {e}")))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::internal(format!("Failed to watch {}: {e}", dir.display())))?;

        info!(dir = %dir.display(), "Watching folder");
        Ok((
            Self {
                _watcher: watcher,
                dir: dir.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Files currently in `dir` accepted by `filter`, sorted by name.
pub async fn scan_existing<F>(dir: &Path, filter: F) -> AppResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) && filter(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
