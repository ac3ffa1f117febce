//! File stability detection.
//!
//! A file written by an external producer is considered stable once its size
//! has not changed for the policy's dwell interval and it can be opened
//! exclusively, which proves the producer has closed its handle.

use std::path::{Path, PathBuf};

use tokio::time::Instant;
use tracing::{debug, trace};

use panelsync_core::types::StabilityPolicy;

/// Wait until `path` stops changing and is no longer held open.
///
/// Returns `false` if the file is missing at call time, disappears while
/// polling, or the timeout elapses. Transient I/O errors count as "not yet
/// stable".
pub async fn wait_until_stable(path: &Path, policy: StabilityPolicy) -> bool {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Stability check on missing file");
        return false;
    }

    let started = Instant::now();
    let mut last_size: Option<u64> = None;
    let mut last_change = started;

    loop {
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let size = meta.len();
                if last_size != Some(size) {
                    last_size = Some(size);
                    last_change = Instant::now();
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "File disappeared during stability check");
                return false;
            }
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Transient metadata error");
                last_size = None;
                last_change = Instant::now();
            }
        }

        if last_size.is_some()
            && last_change.elapsed() >= policy.dwell
            && can_open_exclusively(path.to_path_buf()).await
        {
            debug!(
                path = %path.display(),
                size = last_size.unwrap_or_default(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "File is stable"
            );
            return true;
        }

        if started.elapsed() >= policy.timeout {
            debug!(
                path = %path.display(),
                timeout_ms = policy.timeout.as_millis() as u64,
                "File did not stabilize before timeout"
            );
            return false;
        }

        tokio::time::sleep(policy.poll).await;
    }
}

async fn can_open_exclusively(path: PathBuf) -> bool {
    tokio::task::spawn_blocking(move || try_open_exclusive(&path))
        .await
        .unwrap_or(false)
}

/// Whether no other handle currently holds `path` open for writing.
#[cfg(windows)]
pub fn try_open_exclusive(path: &Path) -> bool {
    use std::os::windows::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
        .is_ok()
}

/// Whether no other handle currently holds `path` open for writing.
///
/// Unix has no share modes, so this takes a non-blocking exclusive advisory
/// lock; producers that lock their output are detected.
#[cfg(not(windows))]
pub fn try_open_exclusive(path: &Path) -> bool {
    use fs2::FileExt;

    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn policy(dwell: u64, poll: u64, timeout: u64) -> StabilityPolicy {
        StabilityPolicy::from_millis(dwell, poll, timeout)
    }

    #[tokio::test]
    async fn test_missing_file_is_not_stable() {
        let dir = tempfile::tempdir().unwrap();
        let started = std::time::Instant::now();
        let ok = wait_until_stable(&dir.path().join("nope.bin"), policy(100, 20, 2000)).await;
        assert!(!ok);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_untouched_file_settles_within_dwell_plus_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.igs");
        std::fs::write(&path, b"complete").unwrap();

        let started = std::time::Instant::now();
        assert!(wait_until_stable(&path, policy(200, 50, 5000)).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_growing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.dxf");
        std::fs::write(&path, b"").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            for _ in 0..80 {
                file.write_all(b"0\nLINE\n").unwrap();
                file.flush().unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let started = std::time::Instant::now();
        let ok = wait_until_stable(&path, policy(200, 50, 500)).await;
        assert!(!ok);
        assert!(started.elapsed() >= Duration::from_millis(500));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_deleted_file_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vanishing.obj");
        std::fs::write(&path, b"v 0 0 0").unwrap();

        let remove_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            std::fs::remove_file(&remove_path).unwrap();
        });

        assert!(!wait_until_stable(&path, policy(2000, 20, 5000)).await);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_held_handle_blocks_stability_until_released() {
        use fs2::FileExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.igs");
        std::fs::write(&path, vec![b'x'; 1024]).unwrap();

        let holder = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        holder.lock_exclusive().unwrap();

        assert!(!wait_until_stable(&path, policy(100, 25, 400)).await);

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            FileExt::unlock(&holder).unwrap();
            drop(holder);
        });

        assert!(wait_until_stable(&path, policy(100, 25, 3000)).await);
        release.await.unwrap();
    }
}
