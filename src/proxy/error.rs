//! Error types for proxied calls.

use thiserror::Error;

/// Result type for call proxy operations.
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors returned by a single proxied call. Never retried.
#[derive(Debug, Error)]
pub enum CallError {
    /// The request could not be serialized.
    #[error("Failed to encode {service}.{method} request: {source}")]
    Encode {
        service: String,
        method: String,
        #[source]
        source: prost::EncodeError,
    },

    /// The HTTP round trip to the sidecar failed.
    #[error("Transport failure calling {service}.{method}: {reason}")]
    Transport {
        service: String,
        method: String,
        /// Reason for failure.
        reason: String,
    },

    /// The sidecar answered with something other than 200.
    #[error("{service}.{method}: got status {status}; body: {body:?}")]
    NonOkStatus {
        service: String,
        method: String,
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded for diagnostics.
        body: String,
    },

    /// The response body could not be deserialized.
    #[error("Failed to decode {service}.{method} response: {source}")]
    Decode {
        service: String,
        method: String,
        #[source]
        source: prost::DecodeError,
    },
}

impl CallError {
    pub(crate) fn transport(service: &str, method: &str, reason: impl ToString) -> Self {
        Self::Transport {
            service: service.to_string(),
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}
