use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional};
use crate::error::ConfigError;
use crate::sidecar::{DEFAULT_STARTUP_TIMEOUT, LogLevel};

/// Default verbosity when [`Options`](crate::Options) leaves it unset.
pub const LOG_LEVEL_ENV: &str = "AETEST_LOG_LEVEL";

/// Startup deadline in seconds when [`Options`](crate::Options) leaves it unset.
pub const STARTUP_TIMEOUT_ENV: &str = "AETEST_STARTUP_TIMEOUT_SECS";

/// Environment-driven defaults for sidecar launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarSettings {
    /// Diagnostic verbosity.
    pub log_level: LogLevel,
    /// Time to wait for the readiness marker.
    pub startup_timeout: Duration,
}

impl Default for SidecarSettings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl SidecarSettings {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Self::from_values(optional_env(LOG_LEVEL_ENV)?, optional_env(STARTUP_TIMEOUT_ENV)?)
    }

    fn from_values(
        log_level: Option<String>,
        startup_timeout_secs: Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_level = parse_optional(LOG_LEVEL_ENV, log_level, defaults.log_level)?;
        let secs = parse_optional(
            STARTUP_TIMEOUT_ENV,
            startup_timeout_secs,
            defaults.startup_timeout.as_secs(),
        )?;
        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: STARTUP_TIMEOUT_ENV.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            log_level,
            startup_timeout: Duration::from_secs(secs),
        })
    }
}
