//! Error types for sidecar management.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for sidecar operations.
pub type Result<T> = std::result::Result<T, SidecarError>;

/// Errors that can occur while preparing, launching or waiting on a sidecar.
#[derive(Debug, Error)]
pub enum SidecarError {
    /// The OS refused to hand out an ephemeral port.
    #[error("No free port available: {reason}")]
    PortExhausted {
        /// Reason for failure.
        reason: String,
    },

    /// Creating or writing the workspace failed.
    #[error("Workspace I/O failed at {}: {source}", path.display())]
    Workspace {
        /// Path being created or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The sidecar executable could not be found or spawned.
    #[error("Failed to launch sidecar: {reason}")]
    LaunchFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The readiness marker did not appear before the deadline.
    #[error("Timeout starting sidecar: not ready within {timeout:?}")]
    ReadinessTimeout {
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The diagnostic stream failed or ended before the readiness marker.
    #[error("Error reading sidecar output: {0}")]
    ReadinessStreamClosed(#[source] std::io::Error),
}

impl SidecarError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn launch(reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            reason: reason.into(),
        }
    }
}
