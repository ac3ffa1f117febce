//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Console format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Size in bytes after which the log file is rolled to `<file>.1`.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

fn default_max_file_bytes() -> u64 {
    2_000_000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}
