//! Locating the emulator executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::sidecar::config::APPSERVER_FILE_NAME;
use crate::sidecar::error::{Result, SidecarError};

/// Environment variable naming the SDK directory.
pub const SDK_ENV: &str = "APPENGINE_SDK";

/// SDK directories probed under `$HOME`, in order.
const HOME_CANDIDATES: &[&[&str]] = &[
    &["sdk", "go_appengine"],
    &["sdk", "google_appengine"],
    &["google_appengine"],
    &["go_appengine"],
];

/// Resolve the emulator entry point.
///
/// An explicit path wins, then `APPENGINE_SDK`, then the conventional SDK
/// locations under the home directory, then `PATH`. An explicit path or a set
/// `APPENGINE_SDK` that does not exist is an error, never a fallthrough.
pub fn find_appserver(explicit: Option<&Path>) -> Result<PathBuf> {
    let sdk = std::env::var(SDK_ENV).ok().filter(|s| !s.is_empty());
    find_with(
        explicit,
        sdk.as_deref(),
        dirs::home_dir().as_deref(),
        std::env::var_os("PATH"),
    )
}

pub(crate) fn find_with(
    explicit: Option<&Path>,
    sdk: Option<&str>,
    home: Option<&Path>,
    path_var: Option<OsString>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(SidecarError::launch(format!(
            "appserver path {:?} doesn't exist",
            path
        )));
    }

    if let Some(sdk) = sdk {
        let path = Path::new(sdk).join(APPSERVER_FILE_NAME);
        if path.is_file() {
            return Ok(path);
        }
        return Err(SidecarError::launch(format!(
            "invalid {} environment variable; path {:?} doesn't exist",
            SDK_ENV, path
        )));
    }

    if let Some(home) = home {
        for parts in HOME_CANDIDATES {
            let path = parts
                .iter()
                .fold(home.to_path_buf(), |acc, part| acc.join(part))
                .join(APPSERVER_FILE_NAME);
            if path.is_file() {
                tracing::debug!("Found appserver at {}", path.display());
                return Ok(path);
            }
        }
    }

    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(&path_var) {
            let path = dir.join(APPSERVER_FILE_NAME);
            if path.is_file() {
                return Ok(path);
            }
        }
    }

    Err(SidecarError::launch(format!(
        "{} not found; set {} or add the SDK to PATH",
        APPSERVER_FILE_NAME, SDK_ENV
    )))
}
