//! Artifact inspection CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::output::{self, OutputFormat};
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_core::types::{ArtifactFormat, StabilityPolicy};
use panelsync_storage::latest::latest_stable;
use panelsync_storage::{soft_validate, wait_until_stable};

/// Format selector for commands that cannot infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Iges,
    Dxf,
    Obj,
}

impl From<FormatArg> for ArtifactFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Iges => ArtifactFormat::Iges,
            FormatArg::Dxf => ArtifactFormat::Dxf,
            FormatArg::Obj => ArtifactFormat::Obj,
        }
    }
}

/// Arguments for `validate`
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Artifact to check
    pub path: PathBuf,
    /// Format override (inferred from the extension otherwise)
    #[arg(long, value_enum)]
    pub as_format: Option<FormatArg>,
}

/// Arguments for `wait-stable`
#[derive(Debug, Args)]
pub struct WaitStableArgs {
    /// File to watch
    pub path: PathBuf,
    /// Required quiet period in milliseconds (defaults to the job policy)
    #[arg(long)]
    pub dwell_ms: Option<u64>,
    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,
    /// Give up after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for `latest`
#[derive(Debug, Args)]
pub struct LatestArgs {
    /// Artifact format
    #[arg(value_enum)]
    pub format: FormatArg,
    /// Project id (defaults to the configured one)
    #[arg(long)]
    pub project: Option<String>,
}

/// Soft-validate one artifact.
pub async fn validate(args: &ValidateArgs, format: OutputFormat) -> Result<(), AppError> {
    let artifact_format = args
        .as_format
        .map(ArtifactFormat::from)
        .or_else(|| ArtifactFormat::from_path(&args.path))
        .ok_or_else(|| {
            AppError::validation(format!(
                "Cannot infer the format of '{}', pass --as-format",
                args.path.display()
            ))
        })?;

    let report = soft_validate(&args.path, artifact_format).await;
    output::print_item(&report, format);
    if report.ok {
        output::print_success(&format!("{} looks like valid {}", args.path.display(), artifact_format));
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{} failed soft validation: {}",
            args.path.display(),
            report.reason
        )))
    }
}

/// Block until a file is stable.
pub async fn wait_stable(args: &WaitStableArgs, config: &AppConfig) -> Result<(), AppError> {
    let defaults = config.watcher.job_policy();
    let policy = StabilityPolicy::new(
        args.dwell_ms.map(Duration::from_millis).unwrap_or(defaults.dwell),
        args.poll_ms.map(Duration::from_millis).unwrap_or(defaults.poll),
        args.timeout_ms.map(Duration::from_millis).unwrap_or(defaults.timeout),
    );

    if wait_until_stable(&args.path, policy).await {
        output::print_success(&format!("{} is stable", args.path.display()));
        Ok(())
    } else {
        Err(AppError::timeout(format!(
            "{} did not become stable within {} ms",
            args.path.display(),
            policy.timeout.as_millis()
        )))
    }
}

/// Print the newest stable artifact for a project.
pub async fn latest(args: &LatestArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let project = args.project.as_deref().unwrap_or(&config.project.project_id);
    let artifact_format = ArtifactFormat::from(args.format);

    match latest_stable(
        &config.hot_folder.surveying_export_root(),
        project,
        artifact_format,
        StabilityPolicy::latest_artifact(),
    )
    .await?
    {
        Some(path) => match format {
            OutputFormat::Json => output::print_item(&path, format),
            OutputFormat::Table => println!("{}", path.display()),
        },
        None => output::print_warning(&format!(
            "No stable {} artifact for project '{}'",
            artifact_format, project
        )),
    }
    Ok(())
}
