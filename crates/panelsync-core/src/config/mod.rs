//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from an
//! optional TOML file overlaid with `PANELSYNC__`-prefixed environment
//! variables. Every field carries a default so an empty file is valid.

pub mod export;
pub mod hot_folder;
pub mod logging;
pub mod watcher;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::export::ExportConfig;
pub use self::hot_folder::HotFolderConfig;
pub use self::logging::LoggingConfig;
pub use self::watcher::WatcherConfig;

use crate::error::AppError;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "PANELSYNC_CONFIG";

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root application configuration.
///
/// Built once per process and handed to each component at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// Hot folder locations.
    pub hot_folder: HotFolderConfig,
    /// Project identity stamped onto jobs and exported artifacts.
    pub project: ProjectConfig,
    /// External export driver settings.
    #[validate(nested)]
    pub export: ExportConfig,
    /// Job watcher settings (consumer side).
    #[validate(nested)]
    pub watcher: WatcherConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Project identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project identifier written into jobs and sidecar metadata.
    pub project_id: String,
    /// Geometric group exported from the surveying document.
    pub group: String,
    /// Zone label used in reference artifact names.
    pub zone: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_id: uuid::Uuid::new_v4().simple().to_string(),
            group: "Geometric Group".to_string(),
            zone: String::new(),
        }
    }
}

impl ProjectConfig {
    /// Zone label for artifact names, falling back to the group name.
    pub fn zone_or_group(&self) -> &str {
        if self.zone.trim().is_empty() {
            &self.group
        } else {
            &self.zone
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (optional) and the environment.
    pub fn load(path: &str) -> Result<Self, AppError> {
        tracing::debug!(path, "Loading configuration");
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("PANELSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Resolve the configuration path from an explicit argument, the
    /// `PANELSYNC_CONFIG` variable, or the default location.
    pub fn resolve_path(explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.toml");
        let config = AppConfig::load(path.to_str().expect("utf8")).expect("load");
        assert_eq!(config.export.timeout_seconds, 120);
        assert_eq!(config.watcher.dwell_ms, 600);
        assert_eq!(config.project.group, "Geometric Group");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("panelsync.toml");
        let root = temp.path().join("hot");
        std::fs::write(
            &path,
            format!(
                "[hot_folder]\nroot = {:?}\n\n[export]\ntimeout_seconds = 300\n\n[watcher]\nconcurrency = 2\nclaim_before_execute = true\n",
                root.to_string_lossy()
            ),
        )
        .expect("write");

        let config = AppConfig::load(path.to_str().expect("utf8")).expect("load");
        assert_eq!(config.hot_folder.root, root);
        assert_eq!(config.export.timeout_seconds, 300);
        assert_eq!(config.watcher.concurrency, 2);
        assert!(config.watcher.claim_before_execute);
    }

    #[test]
    fn test_shipped_default_file_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
        let config = AppConfig::load(path).expect("load");
        let defaults = AppConfig::default();
        assert_eq!(config.export.final_timeout_ms, defaults.export.final_timeout_ms);
        assert_eq!(config.watcher.job_prefix, defaults.watcher.job_prefix);
        assert_eq!(config.watcher.mesh, defaults.watcher.mesh);
        assert_eq!(config.logging.max_file_bytes, 2_000_000);
        assert!(!config.project.project_id.is_empty());
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[watcher]\nconcurrency = 0\n").expect("write");

        let err = AppConfig::load(path.to_str().expect("utf8")).expect_err("invalid");
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_zone_falls_back_to_group() {
        let project = ProjectConfig {
            zone: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(project.zone_or_group(), "Geometric Group");

        let zoned = ProjectConfig {
            zone: "ZONEA".to_string(),
            ..Default::default()
        };
        assert_eq!(zoned.zone_or_group(), "ZONEA");
    }
}
