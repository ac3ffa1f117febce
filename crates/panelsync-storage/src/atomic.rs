//! Atomic file publication.
//!
//! Content is written to a uniquely named sibling temp file, flushed to disk,
//! then renamed over the target. Observers of the target path see either the
//! previous complete file or the new complete file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use panelsync_core::error::{AppError, ErrorKind};
use panelsync_core::result::AppResult;

/// Marker inserted between the target name and the temp suffix.
pub const TEMP_MARKER: &str = ".tmp.";

/// Temp file path used when publishing `target`.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(TEMP_MARKER);
    name.push(uuid::Uuid::new_v4().simple().to_string());
    PathBuf::from(name)
}

/// Whether `path` looks like an in-flight temp file.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(TEMP_MARKER))
        .unwrap_or(false)
}

/// Write `bytes` to `path` atomically, creating the parent directory.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create directory: {}", parent.display()),
                e,
            )
        })?;
    }

    let tmp = temp_path_for(path);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create temp file: {}", tmp.display()),
                e,
            )
        })?;

    let result = async {
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(tmp = %tmp.display(), error = %cleanup, "Failed to remove temp file");
            }
        }
        return Err(AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to publish {}", path.display()),
            e,
        ));
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Published file atomically");
    Ok(())
}

/// UTF-8 text variant of [`write_atomic`].
pub async fn write_atomic_text(path: &Path, text: &str) -> AppResult<()> {
    write_atomic(path, text.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn leftover_temps(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_temp_file(p))
            .collect()
    }

    #[tokio::test]
    async fn test_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("job_1.json");

        write_atomic(&path, b"first").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second version").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second version");
        assert!(leftover_temps(path.parent().unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("inner.txt"), b"x").unwrap();

        let err = write_atomic(&target, b"payload").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(leftover_temps(dir.path()).is_empty());
        assert!(target.is_dir());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reader_never_sees_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.igs");
        let small = vec![b'a'; 4 * 1024];
        let large = vec![b'b'; 256 * 1024];
        write_atomic(&path, &small).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader_path = path.clone();
        let reader_done = done.clone();
        let (small_len, large_len) = (small.len(), large.len());
        let reader = tokio::task::spawn_blocking(move || {
            let mut reads = 0u32;
            while !reader_done.load(Ordering::SeqCst) {
                if let Ok(content) = std::fs::read(&reader_path) {
                    let all_a = content.len() == small_len && content.iter().all(|b| *b == b'a');
                    let all_b = content.len() == large_len && content.iter().all(|b| *b == b'b');
                    assert!(all_a || all_b, "observed partial content of {} bytes", content.len());
                    reads += 1;
                }
            }
            reads
        });

        for i in 0..40 {
            let payload = if i % 2 == 0 { &large } else { &small };
            write_atomic(&path, payload).await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let reads = reader.await.unwrap();
        assert!(reads > 0);
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_temp_file_detection() {
        assert!(is_temp_file(Path::new("/x/job_1.json.tmp.abc")));
        assert!(!is_temp_file(Path::new("/x/job_1.json")));
    }
}
