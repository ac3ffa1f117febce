//! External export driver configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::StabilityPolicy;

/// Settings for driving the surveying tool in scripted mode.
///
/// If `app_path` is empty the driver discovers the executable from known
/// install locations and then `PATH`.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Explicit path to the surveying tool executable. Empty means discover.
    pub app_path: PathBuf,

    /// Directory holding the export scripts. Empty means next to the executable.
    pub scripts_dir: PathBuf,

    /// IGES export script file name.
    #[serde(default = "default_iges_script")]
    pub iges_script: String,

    /// DXF export script file name.
    #[serde(default = "default_dxf_script")]
    pub dxf_script: String,

    /// Overall wall-clock limit for one export run.
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 5, max = 7200))]
    pub timeout_seconds: u64,

    /// Sleep between process/output polls.
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 10, max = 10000))]
    pub poll_interval_ms: u64,

    /// Dwell used when probing output while the process still runs.
    #[serde(default = "default_probe_dwell_ms")]
    pub probe_dwell_ms: u64,

    #[serde(default = "default_probe_poll_ms")]
    #[validate(range(min = 10))]
    pub probe_poll_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Dwell for the final authoritative stability read.
    #[serde(default = "default_final_dwell_ms")]
    pub final_dwell_ms: u64,

    #[serde(default = "default_final_poll_ms")]
    #[validate(range(min = 10))]
    pub final_poll_ms: u64,

    #[serde(default = "default_final_timeout_ms")]
    pub final_timeout_ms: u64,

    /// Delay before the single soft-validation retry.
    #[serde(default = "default_revalidate_delay_ms")]
    pub revalidate_delay_ms: u64,

    /// Read the script console log after each run and log it at debug level.
    #[serde(default = "default_true")]
    pub capture_output: bool,

    /// Publish a placeholder DXF when a DXF export fails.
    #[serde(default = "default_true")]
    pub dxf_stub_fallback: bool,
}

fn default_iges_script() -> String {
    "ExportGeometricGroupToIges.js".to_string()
}

fn default_dxf_script() -> String {
    "ExportGeometricGroupToDxf.js".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_probe_dwell_ms() -> u64 {
    1000
}

fn default_probe_poll_ms() -> u64 {
    200
}

fn default_probe_timeout_ms() -> u64 {
    15_000
}

fn default_final_dwell_ms() -> u64 {
    1000
}

fn default_final_poll_ms() -> u64 {
    250
}

fn default_final_timeout_ms() -> u64 {
    60_000
}

fn default_revalidate_delay_ms() -> u64 {
    1500
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            app_path: PathBuf::new(),
            scripts_dir: PathBuf::new(),
            iges_script: default_iges_script(),
            dxf_script: default_dxf_script(),
            timeout_seconds: default_timeout_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            probe_dwell_ms: default_probe_dwell_ms(),
            probe_poll_ms: default_probe_poll_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            final_dwell_ms: default_final_dwell_ms(),
            final_poll_ms: default_final_poll_ms(),
            final_timeout_ms: default_final_timeout_ms(),
            revalidate_delay_ms: default_revalidate_delay_ms(),
            capture_output: true,
            dxf_stub_fallback: true,
        }
    }
}

impl ExportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Short stability check applied while the child is still running.
    pub fn probe_policy(&self) -> StabilityPolicy {
        StabilityPolicy::from_millis(self.probe_dwell_ms, self.probe_poll_ms, self.probe_timeout_ms)
    }

    /// Longer stability check applied once the loop has ended.
    pub fn final_policy(&self) -> StabilityPolicy {
        StabilityPolicy::from_millis(self.final_dwell_ms, self.final_poll_ms, self.final_timeout_ms)
    }

    pub fn revalidate_delay(&self) -> Duration {
        Duration::from_millis(self.revalidate_delay_ms)
    }

    /// Explicit executable path, if one is configured.
    pub fn explicit_app_path(&self) -> Option<&PathBuf> {
        if self.app_path.as_os_str().is_empty() {
            None
        } else {
            Some(&self.app_path)
        }
    }

    /// Explicit scripts directory, if one is configured.
    pub fn explicit_scripts_dir(&self) -> Option<&PathBuf> {
        if self.scripts_dir.as_os_str().is_empty() {
            None
        } else {
            Some(&self.scripts_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = ExportConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(120));
        let probe = config.probe_policy();
        assert_eq!(probe.dwell, Duration::from_millis(1000));
        assert_eq!(probe.poll, Duration::from_millis(200));
        assert_eq!(probe.timeout, Duration::from_millis(15_000));
        assert_eq!(config.final_policy().timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_paths_mean_discover() {
        let config = ExportConfig::default();
        assert!(config.explicit_app_path().is_none());
        assert!(config.explicit_scripts_dir().is_none());

        let config = ExportConfig {
            app_path: PathBuf::from("/opt/3dr/3DR.exe"),
            ..Default::default()
        };
        assert_eq!(
            config.explicit_app_path(),
            Some(&PathBuf::from("/opt/3dr/3DR.exe"))
        );
    }
}
