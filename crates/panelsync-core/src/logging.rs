//! Tracing bootstrap shared by the agent and the CLI.
//!
//! Installs a registry with an `EnvFilter`, a console layer (pretty or JSON)
//! and a plain-text file layer writing into the hot folder's `logs/`
//! directory. The file rolls to `<file>.1` once it grows past the configured
//! size.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::AppError;
use crate::result::AppResult;

/// Log file written by the consumer (host add-in) process.
pub const CONSUMER_LOG_FILE: &str = "inventor-addin.log";

/// Log file written by the producer process.
pub const PRODUCER_LOG_FILE: &str = "panelsync.log";

/// Size-capped log file writer usable as a `tracing_subscriber` writer.
///
/// Writes never fail from the caller's point of view: an I/O error drops the
/// line rather than crashing the process.
#[derive(Clone)]
pub struct RollingFileWriter {
    state: Arc<Mutex<RollingState>>,
}

struct RollingState {
    path: PathBuf,
    max_bytes: u64,
    file: Option<File>,
    written: u64,
}

impl RollingFileWriter {
    /// Open (or create) `path` for appending.
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        let path = path.into();
        let written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self {
            state: Arc::new(Mutex::new(RollingState {
                path,
                max_bytes,
                file: None,
                written,
            })),
        }
    }

    /// Path of the active log file.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RollingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RollingState {
    fn rolled_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".1");
        PathBuf::from(name)
    }

    fn roll_if_needed(&mut self, incoming: usize) -> io::Result<()> {
        if self.max_bytes == 0 || self.written + incoming as u64 <= self.max_bytes {
            return Ok(());
        }
        self.file = None;
        let rolled = self.rolled_path();
        if rolled.exists() {
            fs::remove_file(&rolled)?;
        }
        if self.path.exists() {
            fs::rename(&self.path, &rolled)?;
        }
        self.written = 0;
        Ok(())
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        self.roll_if_needed(buf.len())?;
        self.file()?.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }
}

/// Handle returned by [`RollingFileWriter::make_writer`].
pub struct RollingFileHandle {
    writer: RollingFileWriter,
}

impl Write for RollingFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.writer.lock();
        if state.append(buf).is_err() {
            state.file = None;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.writer.lock();
        if let Some(file) = state.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RollingFileWriter {
    type Writer = RollingFileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RollingFileHandle {
            writer: self.clone(),
        }
    }
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Plain-text layer writing into the rolling log file.
fn file_layer<S>(writer: RollingFileWriter) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
}

/// Install the global subscriber.
///
/// `log_dir` is created if missing; `file_name` is one of
/// [`CONSUMER_LOG_FILE`] or [`PRODUCER_LOG_FILE`].
pub fn init_logging(config: &LoggingConfig, log_dir: &Path, file_name: &str) -> AppResult<()> {
    fs::create_dir_all(log_dir)?;
    let file_writer = RollingFileWriter::new(log_dir.join(file_name), config.max_file_bytes);

    let result = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(build_env_filter(&config.level))
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .with(file_layer(file_writer))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(build_env_filter(&config.level))
            .with(fmt::layer().pretty().with_target(true))
            .with(file_layer(file_writer))
            .try_init(),
    };

    result.map_err(|e| AppError::internal(format!("Failed to install tracing subscriber: {e}")))
}
