//! Options for creating a [`Context`](crate::Context).
//!
//! Anything left unset in [`Options`] falls back to the environment
//! (`AETEST_LOG_LEVEL`, `AETEST_STARTUP_TIMEOUT_SECS`) and then to built-in
//! defaults.

pub(crate) mod helpers;
mod sidecar;

use std::path::PathBuf;
use std::time::Duration;

pub use sidecar::{LOG_LEVEL_ENV, STARTUP_TIMEOUT_ENV, SidecarSettings};

use crate::error::ConfigError;
use crate::sidecar::LogLevel;

/// Application id used when none is given.
pub const DEFAULT_APP_ID: &str = "testapp";

/// API version written into the application descriptor by default.
pub const DEFAULT_API_VERSION: &str = "go1";

/// Optional behaviour for [`Context::new`](crate::Context::new).
///
/// `Options::default()` is valid and means "use every default".
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Application id to pretend to be. Defaults to `testapp`.
    pub app_id: Option<String>,
    /// Task queues to declare in `queue.yaml`.
    pub task_queues: Vec<String>,
    /// Diagnostic verbosity. Defaults to `error`.
    pub log_level: Option<LogLevel>,
    /// `api_version` in `app.yaml`. Defaults to `go1`.
    pub api_version: Option<String>,
    /// Explicit emulator executable, bypassing the search.
    pub appserver_path: Option<PathBuf>,
    /// Directory that holds the temporary workspace. Defaults to the system
    /// temp dir.
    pub workspace_root: Option<PathBuf>,
    /// Readiness deadline. Defaults to 10 seconds.
    pub startup_timeout: Option<Duration>,
    /// Log every proxied request and response.
    pub trace_calls: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn task_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_queues = queues.into_iter().map(Into::into).collect();
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn appserver_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.appserver_path = Some(path.into());
        self
    }

    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(path.into());
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    pub fn trace_calls(mut self, enabled: bool) -> Self {
        self.trace_calls = enabled;
        self
    }

    pub(crate) fn resolve(self) -> Result<ResolvedOptions, ConfigError> {
        Ok(self.resolve_with(&SidecarSettings::resolve()?))
    }

    fn resolve_with(self, env: &SidecarSettings) -> ResolvedOptions {
        ResolvedOptions {
            app_id: self
                .app_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            task_queues: self.task_queues,
            log_level: self.log_level.unwrap_or(env.log_level),
            api_version: self
                .api_version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            appserver_path: self.appserver_path,
            workspace_root: self.workspace_root,
            startup_timeout: self.startup_timeout.unwrap_or(env.startup_timeout),
            trace_calls: self.trace_calls,
        }
    }
}

/// [`Options`] with every default filled in.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub app_id: String,
    pub task_queues: Vec<String>,
    pub log_level: LogLevel,
    pub api_version: String,
    pub appserver_path: Option<PathBuf>,
    pub workspace_root: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub trace_calls: bool,
}
