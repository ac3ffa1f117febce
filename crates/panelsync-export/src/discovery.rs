//! Export application discovery.
//!
//! Locates the surveying application's executable by checking, in order:
//! 1. The explicitly configured path
//! 2. The Windows `App Paths` registry entry (Windows only)
//! 3. Known installation folders
//! 4. The system PATH

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ExportError;

/// Executable name of the surveying application.
#[cfg(windows)]
pub const APP_EXECUTABLE: &str = "3DR.exe";
#[cfg(not(windows))]
pub const APP_EXECUTABLE: &str = "3DR";

/// Install folders used by known releases.
const KNOWN_INSTALL_PATHS: &[&str] = &[
    r"E:\Installed software\Cyclone 3DR\3DR.exe",
    r"C:\Program Files\Leica\Cyclone 3DR\3DR.exe",
    r"C:\Program Files\Leica Geosystems\Cyclone 3DR\3DR.exe",
    r"C:\Program Files (x86)\Leica\Cyclone 3DR\3DR.exe",
];

#[cfg(windows)]
const APP_PATHS_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\3DR.exe";

/// How the executable was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    ExplicitConfig,
    WindowsRegistry,
    CommonPath,
    SystemPath,
}

/// A located export application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportAppInstallation {
    /// Full path to the executable.
    pub executable: PathBuf,
    /// Directory holding the executable; the child runs with this as its
    /// working directory.
    pub install_dir: PathBuf,
    pub discovery_method: DiscoveryMethod,
}

impl ExportAppInstallation {
    fn at(executable: PathBuf, discovery_method: DiscoveryMethod) -> Self {
        let install_dir = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            executable,
            install_dir,
            discovery_method,
        }
    }
}

/// Discovery engine for the export application.
pub struct ExportAppDiscovery;

impl ExportAppDiscovery {
    /// Locate the executable.
    ///
    /// A configured path that does not exist is an error rather than a
    /// reason to keep searching.
    pub fn discover(explicit: Option<&Path>) -> Result<ExportAppInstallation, ExportError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ExportError::NotFound {
                    what: "export application",
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "Using configured export application");
            return Ok(ExportAppInstallation::at(
                path.to_path_buf(),
                DiscoveryMethod::ExplicitConfig,
            ));
        }

        #[cfg(windows)]
        {
            if let Some(found) = Self::discover_from_registry() {
                info!(path = %found.display(), "Found export application via App Paths registry");
                return Ok(ExportAppInstallation::at(found, DiscoveryMethod::WindowsRegistry));
            }
        }

        if let Some(found) = Self::first_existing(KNOWN_INSTALL_PATHS.iter().map(PathBuf::from)) {
            info!(path = %found.display(), "Found export application in install folder");
            return Ok(ExportAppInstallation::at(found, DiscoveryMethod::CommonPath));
        }

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        let on_path = std::env::split_paths(&path_var).map(|dir| dir.join(APP_EXECUTABLE));
        if let Some(found) = Self::first_existing(on_path) {
            info!(path = %found.display(), "Found export application on PATH");
            return Ok(ExportAppInstallation::at(found, DiscoveryMethod::SystemPath));
        }

        Err(ExportError::AppNotDiscovered)
    }

    fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        candidates.into_iter().find(|c| {
            let hit = c.is_file();
            debug!(candidate = %c.display(), hit, "Probing export application path");
            hit
        })
    }

    /// Read the default value of the `App Paths` key from HKLM, then HKCU.
    #[cfg(windows)]
    fn discover_from_registry() -> Option<PathBuf> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ};

        for (root, name) in [(HKEY_LOCAL_MACHINE, "HKLM"), (HKEY_CURRENT_USER, "HKCU")] {
            let key = match RegKey::predef(root).open_subkey_with_flags(APP_PATHS_KEY, KEY_READ) {
                Ok(key) => key,
                Err(e) => {
                    debug!(root = name, error = %e, "App Paths entry not present");
                    continue;
                }
            };
            if let Ok(value) = key.get_value::<String, _>("") {
                let path = PathBuf::from(value.trim_matches('"'));
                if path.is_file() {
                    return Some(path);
                }
            }
        }
        None
    }
}
