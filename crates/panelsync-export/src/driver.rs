//! External export driver.
//!
//! Runs the surveying application headless with an autorun script and
//! infers completion from the artifact on disk: the application's exit is
//! not tied to the moment it finishes flushing the export.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use panelsync_core::config::ExportConfig;
use panelsync_core::types::ArtifactFormat;
use panelsync_storage::{soft_validate, wait_until_stable};

use crate::error::ExportError;
use crate::metrics::{ExportMetrics, MetricsSnapshot};
use crate::script::{script_path, ScriptParams};

/// Upper bound on waiting for the output pipes after the child exited.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One scripted export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Export application executable.
    pub app: PathBuf,
    pub script: PathBuf,
    /// Document opened by the application.
    pub source: PathBuf,
    /// Where the script is told to write the artifact.
    pub output: PathBuf,
    /// Format used to soft-validate the artifact.
    pub format: ArtifactFormat,
    /// Assignments appended after `project` and `out`.
    pub params: ScriptParams,
}

impl ExportRequest {
    /// Full `--ScriptParam` value.
    pub fn script_params(&self) -> ScriptParams {
        ScriptParams::new()
            .path("project", &self.source)
            .path("out", &self.output)
            .extend(&self.params)
    }

    /// Command line passed to the export application.
    pub fn arguments(&self, console_log: &Path) -> Vec<String> {
        vec![
            format!("--Script={}", script_path(&self.script)),
            format!("--ScriptOutput={}", script_path(console_log)),
            "--Silent".to_string(),
            "--ScriptAutorun".to_string(),
            format!("--ScriptParam={}", self.script_params()),
        ]
    }
}

/// How the wait loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// The child exited on its own.
    Exited,
    /// The artifact settled while the child was still running.
    OutputStable,
    /// The time budget ran out and the process tree was killed.
    TimedOut,
}

/// Drives scripted exports with the timings of one [`ExportConfig`].
#[derive(Debug, Clone)]
pub struct ExportDriver {
    config: ExportConfig,
    metrics: Arc<ExportMetrics>,
}

impl ExportDriver {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(ExportMetrics::new()),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ExportMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run one export and return the artifact bytes.
    ///
    /// Missing inputs fail before anything is spawned. The artifact must be
    /// stable and pass soft-validation (with one delayed retry).
    #[instrument(skip(self, request), fields(source = %request.source.display(), format = %request.format))]
    pub async fn run_export(&self, request: &ExportRequest) -> Result<Vec<u8>, ExportError> {
        ensure_file(&request.app, "export application")?;
        ensure_file(&request.script, "export script")?;
        ensure_file(&request.source, "source document")?;

        self.metrics.record_started();
        let started = Instant::now();

        match self.run_checked(request).await {
            Ok(bytes) => {
                self.metrics
                    .record_success(started.elapsed(), bytes.len() as u64);
                info!(
                    bytes = bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Export completed"
                );
                Ok(bytes)
            }
            Err(e) => {
                if e.is_timeout() {
                    self.metrics.record_timeout();
                } else {
                    self.metrics.record_failure();
                }
                error!(error = %e, "Export failed");
                Err(e)
            }
        }
    }

    async fn run_checked(&self, request: &ExportRequest) -> Result<Vec<u8>, ExportError> {
        let output = &request.output;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            debug!(path = %output.display(), "Removing stale output");
            tokio::fs::remove_file(output).await?;
        }

        let console_log =
            std::env::temp_dir().join(format!("3dr_{}.log", Uuid::new_v4().simple()));
        let exit = self.spawn_and_wait(request, &console_log).await?;

        log_console(&console_log, self.config.capture_output).await;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(match exit {
                LoopExit::TimedOut => ExportError::Timeout {
                    timeout_seconds: self.config.timeout_seconds,
                },
                _ => ExportError::NoOutput {
                    path: output.clone(),
                },
            });
        }
        if exit == LoopExit::TimedOut {
            warn!(path = %output.display(), "Export timed out but left output, checking it");
        }

        if !wait_until_stable(output, self.config.final_policy()).await {
            return Err(ExportError::Unstable {
                path: output.clone(),
            });
        }

        let mut report = soft_validate(output, request.format).await;
        if !report.ok {
            warn!(
                path = %output.display(),
                reason = %report.reason,
                "Soft validation failed, re-checking"
            );
            self.metrics.record_revalidation();
            tokio::time::sleep(self.config.revalidate_delay()).await;
            report = soft_validate(output, request.format).await;
        }
        if !report.ok {
            return Err(ExportError::SoftValidation {
                path: output.clone(),
                reason: report.reason,
            });
        }

        Ok(tokio::fs::read(output).await?)
    }

    async fn spawn_and_wait(
        &self,
        request: &ExportRequest,
        console_log: &Path,
    ) -> Result<LoopExit, ExportError> {
        let args = request.arguments(console_log);
        let mut cmd = Command::new(&request.app);
        if let Some(dir) = request.app.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let (stdout_cfg, stderr_cfg) = if self.config.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(stdout_cfg)
            .stderr(stderr_cfg);

        info!(app = %request.app.display(), args = ?args, "Starting export application");

        let mut child = cmd.spawn().map_err(|source| ExportError::Spawn {
            app: request.app.clone(),
            source,
        })?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exit = self.wait_for_output(&mut child, &request.output).await;
        if exit == LoopExit::OutputStable {
            self.metrics.record_early_completion();
            debug!("Export application still running, leaving its pipes open");
        } else {
            log_pipe("stdout", stdout).await;
            log_pipe("stderr", stderr).await;
        }
        Ok(exit)
    }

    /// Poll the child and the artifact until one of them says we are done.
    async fn wait_for_output(&self, child: &mut Child, output: &Path) -> LoopExit {
        let started = Instant::now();
        let timeout = self.config.timeout();

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(code = ?status.code(), "Export application exited");
                    return LoopExit::Exited;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Could not poll export application");
                    return LoopExit::Exited;
                }
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            if tokio::fs::try_exists(output).await.unwrap_or(false)
                && wait_until_stable(output, self.config.probe_policy().capped(remaining)).await
            {
                info!(path = %output.display(), "Output stable while exporter still running");
                return LoopExit::OutputStable;
            }

            if started.elapsed() >= timeout {
                error!(
                    timeout_s = self.config.timeout_seconds,
                    "Export application timed out, killing process tree"
                );
                kill_process_tree(child).await;
                return LoopExit::TimedOut;
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

fn ensure_file(path: &Path, what: &'static str) -> Result<(), ExportError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ExportError::NotFound {
            what,
            path: path.to_path_buf(),
        })
    }
}

fn drain<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn log_pipe(name: &str, handle: Option<JoinHandle<Vec<u8>>>) {
    let Some(handle) = handle else {
        return;
    };
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, handle).await {
        Ok(Ok(buf)) if !buf.is_empty() => {
            debug!(stream = name, output = %String::from_utf8_lossy(&buf), "Export application output");
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => debug!(stream = name, error = %e, "Output reader failed"),
        Err(_) => debug!(stream = name, "Output still open, not waiting for it"),
    }
}

/// Optionally log, then remove, the script console file. Best effort.
async fn log_console(path: &Path, capture: bool) {
    if capture {
        match tokio::fs::read(path).await {
            Ok(bytes) => debug!(
                log = %path.display(),
                console = %String::from_utf8_lossy(&bytes),
                "Script console"
            ),
            Err(e) => debug!(log = %path.display(), error = %e, "No script console output"),
        }
    }
    let _ = tokio::fs::remove_file(path).await;
}

/// Kill the child and everything it started.
async fn kill_process_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(windows)]
        let status = Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        #[cfg(not(windows))]
        let status = Command::new("kill")
            .args(["-KILL", "--", &format!("-{pid}")])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if let Err(e) = status {
            warn!(pid, error = %e, "Process tree kill failed");
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Child already gone");
    }
}
