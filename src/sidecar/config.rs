//! Configuration types for sidecar launches.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// File name of the emulator entry point inside an SDK directory.
pub const APPSERVER_FILE_NAME: &str = "dev_appserver.py";

/// Substring the emulator writes to stderr once its admin server is up.
pub const READINESS_MARKER: &str = "Starting admin server";

/// How long to wait for [`READINESS_MARKER`] before killing the child.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Diagnostic verbosity for a context and its sidecar.
///
/// Levels are ordered by severity. `Child` additionally forwards every line
/// the sidecar writes to stderr and turns emulator logging up to `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Child,
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Child => "child",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Whether a message at `level` passes this threshold.
    pub fn allows(&self, level: LogLevel) -> bool {
        level >= *self
    }

    /// Whether sidecar stderr lines should be forwarded to the log.
    pub fn forwards_child_output(&self) -> bool {
        *self == LogLevel::Child
    }

    /// Value for the emulator's `--log_level` flag.
    pub fn app_flag(&self) -> &'static str {
        match self {
            LogLevel::Child => "debug",
            other => other.as_str(),
        }
    }

    /// Value for the emulator's `--dev_appserver_log_level` flag.
    pub fn server_flag(&self) -> &'static str {
        match self {
            LogLevel::Child => "debug",
            _ => "info",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "child" => Ok(LogLevel::Child),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(format!(
                "unknown log level '{other}', expected one of child, debug, info, warning, error, critical"
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the supervisor needs to launch one sidecar.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Resolved emulator executable.
    pub executable: PathBuf,
    /// Application directory, passed as the final positional argument.
    pub app_dir: PathBuf,
    /// Directory for emulator storage.
    pub storage_dir: PathBuf,
    /// Port for the API server.
    pub port: u16,
    /// Port for the admin server.
    pub admin_port: u16,
    /// Diagnostic verbosity.
    pub log_level: LogLevel,
    /// Deadline for the readiness marker.
    pub startup_timeout: Duration,
}

impl LaunchSpec {
    /// Emulator flags in launch order, excluding the executable itself.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--clear_datastore=yes".to_string(),
            "--skip_sdk_update_check=yes".to_string(),
            format!("--storage_path={}", self.storage_dir.display()),
            format!("--port={}", self.port),
            format!("--admin_port={}", self.admin_port),
            format!("--log_level={}", self.log_level.app_flag()),
            format!(
                "--dev_appserver_log_level={}",
                self.log_level.server_flag()
            ),
            self.app_dir.display().to_string(),
        ]
    }

    /// Program and full argument list.
    ///
    /// Windows cannot execute the Python entry point directly, so it goes
    /// through `cmd /C`.
    pub fn command_line(&self) -> (String, Vec<String>) {
        let exe = self.executable.display().to_string();
        if cfg!(target_os = "windows") {
            let mut args = vec!["/C".to_string(), exe];
            args.extend(self.args());
            ("cmd".to_string(), args)
        } else {
            (exe, self.args())
        }
    }

    pub fn endpoint(&self) -> SidecarEndpoint {
        SidecarEndpoint {
            host: "127.0.0.1".to_string(),
            port: self.port,
            admin_port: self.admin_port,
        }
    }
}

/// Where a running sidecar can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEndpoint {
    /// Host address (always loopback).
    pub host: String,
    /// API server port.
    pub port: u16,
    /// Admin server port.
    pub admin_port: u16,
}

impl SidecarEndpoint {
    /// Base URL of the API server.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Base URL of the admin console.
    pub fn admin_url(&self) -> String {
        format!("http://{}:{}", self.host, self.admin_port)
    }
}

impl std::fmt::Display for SidecarEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
