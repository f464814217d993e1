//! Crate-level error types.

use thiserror::Error;

use crate::proxy::CallError;
use crate::sidecar::SidecarError;

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors from environment resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be used.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Any error a [`Context`](crate::Context) can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Startup or teardown of the sidecar failed.
    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    /// A proxied call failed.
    #[error(transparent)]
    Call(#[from] CallError),
}
