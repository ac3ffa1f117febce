//! Offset-based log tailing.
//!
//! Used by the producer to surface what the consumer process reports in its
//! log file without holding the file open between polls.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use panelsync_core::result::AppResult;

/// Log lines worth surfacing to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogHighlight {
    ImportComplete,
    ObjExported,
    Warning,
}

impl LogHighlight {
    pub fn label(self) -> &'static str {
        match self {
            Self::ImportComplete => "IGES",
            Self::ObjExported => "OBJ",
            Self::Warning => "WARN",
        }
    }
}

/// Classify one consumer log line.
pub fn classify(line: &str) -> Option<LogHighlight> {
    if line.contains("IGES import complete") {
        Some(LogHighlight::ImportComplete)
    } else if line.contains("OBJ export complete") {
        Some(LogHighlight::ObjExported)
    } else if line.split_whitespace().take(3).any(|t| t == "WARN") {
        Some(LogHighlight::Warning)
    } else {
        None
    }
}

/// Reads lines appended to a file since the last poll.
#[derive(Debug, Clone)]
pub struct LogFollower {
    path: PathBuf,
    offset: u64,
}

impl LogFollower {
    /// Follow `path` from its beginning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    /// Follow `path` from its current end; earlier content is skipped.
    pub async fn from_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        Self { path, offset }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete lines written since the previous call.
    ///
    /// A trailing partial line is left for the next poll. If the file shrank
    /// (rolled or truncated) reading restarts at the beginning.
    pub async fn poll(&mut self) -> AppResult<Vec<String>> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if len < self.offset {
            debug!(path = %self.path.display(), "Log file shrank, restarting from the top");
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.take(len - self.offset).read_to_end(&mut buf).await?;

        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        self.offset += last_newline as u64 + 1;

        Ok(String::from_utf8_lossy(&buf[..last_newline])
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Like [`poll`](Self::poll) but keeps only highlighted lines.
    pub async fn poll_highlights(&mut self) -> AppResult<Vec<(LogHighlight, String)>> {
        Ok(self
            .poll()
            .await?
            .into_iter()
            .filter_map(|line| classify(&line).map(|h| (h, line)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap()
            .write_all(text.as_bytes())
            .unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("2026-01-01T00:00:00Z  INFO panelsync_worker::jobs::import_iges: IGES import complete document=a.ipt"),
            Some(LogHighlight::ImportComplete)
        );
        assert_eq!(
            classify("2026-01-01T00:00:00Z  INFO x: OBJ export complete path=a.obj"),
            Some(LogHighlight::ObjExported)
        );
        assert_eq!(
            classify("2026-01-01T00:00:00Z  WARN x: Document is not open"),
            Some(LogHighlight::Warning)
        );
        assert_eq!(classify("2026-01-01T00:00:00Z  INFO x: WARN in message body"), None);
    }

    #[tokio::test]
    async fn test_reads_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumer.log");
        append(&path, "old line\n");

        let mut follower = LogFollower::from_end(&path).await;
        assert!(follower.poll().await.unwrap().is_empty());

        append(&path, "first\nsecond\npart");
        assert_eq!(follower.poll().await.unwrap(), vec!["first", "second"]);

        append(&path, "ial\n");
        assert_eq!(follower.poll().await.unwrap(), vec!["partial"]);
        assert_eq!(follower.offset(), std::fs::metadata(&path).unwrap().len());
    }

    #[tokio::test]
    async fn test_restarts_after_roll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumer.log");
        append(&path, "a long line that will be rolled away\n");

        let mut follower = LogFollower::new(&path);
        assert_eq!(follower.poll().await.unwrap().len(), 1);

        std::fs::remove_file(&path).unwrap();
        assert!(follower.poll().await.unwrap().is_empty());

        append(&path, "fresh\n");
        assert_eq!(follower.poll().await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_highlights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumer.log");
        let mut follower = LogFollower::new(&path);
        append(
            &path,
            " INFO a: Opening document\n WARN a: Sidecar missing\n INFO a: IGES import complete\n",
        );

        let highlights = follower.poll_highlights().await.unwrap();
        let kinds: Vec<_> = highlights.iter().map(|(h, _)| *h).collect();
        assert_eq!(kinds, vec![LogHighlight::Warning, LogHighlight::ImportComplete]);
    }
}
