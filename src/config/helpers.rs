use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable, treating unset and empty the same.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Parse an optional raw value, falling back to `default` when absent.
pub(crate) fn parse_optional<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<u64>("K", None, 7).unwrap(), 7);
        assert_eq!(parse_optional::<u64>("K", Some(" 12 ".into()), 7).unwrap(), 12);

        let err = parse_optional::<u64>("K", Some("soon".into()), 7).unwrap_err();
        assert!(err.to_string().contains("K"));
    }

    #[test]
    fn test_optional_env_unset() {
        assert!(
            optional_env("AETEST_THIS_VARIABLE_IS_NEVER_SET")
                .unwrap()
                .is_none()
        );
    }
}
