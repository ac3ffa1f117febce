//! Job watcher configuration (consumer side).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::traits::host::{MeasurementUnit, MeshExportOptions};
use crate::types::StabilityPolicy;

/// Job watcher configuration.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Job file name prefix.
    #[serde(default = "default_job_prefix")]
    #[validate(length(min = 1))]
    pub job_prefix: String,

    /// Job file name suffix.
    #[serde(default = "default_job_suffix")]
    #[validate(length(min = 1))]
    pub job_suffix: String,

    /// Job file stability dwell.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    #[serde(default = "default_poll_ms")]
    #[validate(range(min = 10))]
    pub poll_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of job files executed concurrently.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    /// Process job files already present when the watcher starts.
    #[serde(default = "default_true")]
    pub scan_on_start: bool,

    /// Rename a job to `<file>.processing` before executing it.
    #[serde(default)]
    pub claim_before_execute: bool,

    /// Delete malformed or unknown jobs instead of leaving them in place.
    #[serde(default = "default_true")]
    pub remove_invalid: bool,

    /// Leave job files whose execution failed.
    #[serde(default)]
    pub retain_failed: bool,

    /// Reject jobs stamped with a different project id.
    #[serde(default)]
    pub expected_project_id: Option<String>,

    /// Artifact stability dwell before import.
    #[serde(default = "default_dwell_ms")]
    pub artifact_dwell_ms: u64,

    #[serde(default = "default_poll_ms")]
    #[validate(range(min = 10))]
    pub artifact_poll_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub artifact_timeout_ms: u64,

    /// Unit forced on imported references.
    #[serde(default)]
    pub import_units: MeasurementUnit,

    /// Mesh translator options.
    #[serde(default)]
    pub mesh: MeshExportOptions,
}

fn default_job_prefix() -> String {
    "job_".to_string()
}

fn default_job_suffix() -> String {
    ".json".to_string()
}

fn default_dwell_ms() -> u64 {
    600
}

fn default_poll_ms() -> u64 {
    150
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            job_prefix: default_job_prefix(),
            job_suffix: default_job_suffix(),
            dwell_ms: default_dwell_ms(),
            poll_ms: default_poll_ms(),
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            scan_on_start: true,
            claim_before_execute: false,
            remove_invalid: true,
            retain_failed: false,
            expected_project_id: None,
            artifact_dwell_ms: default_dwell_ms(),
            artifact_poll_ms: default_poll_ms(),
            artifact_timeout_ms: default_timeout_ms(),
            import_units: MeasurementUnit::default(),
            mesh: MeshExportOptions::default(),
        }
    }
}

impl WatcherConfig {
    /// Stability policy applied to job files.
    pub fn job_policy(&self) -> StabilityPolicy {
        StabilityPolicy::from_millis(self.dwell_ms, self.poll_ms, self.timeout_ms)
    }

    /// Stability policy applied to artifacts before import.
    pub fn artifact_policy(&self) -> StabilityPolicy {
        StabilityPolicy::from_millis(
            self.artifact_dwell_ms,
            self.artifact_poll_ms,
            self.artifact_timeout_ms,
        )
    }

    /// Whether `file_name` matches the job naming pattern.
    pub fn matches_job_name(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        lower.starts_with(&self.job_prefix.to_ascii_lowercase())
            && lower.ends_with(&self.job_suffix.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_matching() {
        let config = WatcherConfig::default();
        assert!(config.matches_job_name("job_20250101T000000000Z_ab12.json"));
        assert!(config.matches_job_name("JOB_x.JSON"));
        assert!(!config.matches_job_name("job_x.json.tmp.1234"));
        assert!(!config.matches_job_name("job_x.json.processing"));
        assert!(!config.matches_job_name("notes.json"));
    }

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.job_policy().timeout.as_millis(), 8000);
        assert_eq!(config.import_units, MeasurementUnit::Millimeter);
        assert!(config.remove_invalid);
        assert!(!config.claim_before_execute);
        assert!(config.validate().is_ok());
    }
}
