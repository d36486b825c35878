//! Runtime configuration.
//!
//! The only required input is `DATABASE_URL`. Its absence is a precondition
//! failure for the whole run: the caller logs it and returns without ever
//! opening a connection.

use crate::error::{RepairError, RepairResult};

/// Environment variable holding the Postgres connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    database_url: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> RepairResult<Self> {
        Self::from_database_url(std::env::var(DATABASE_URL_VAR).ok())
    }

    /// Build configuration from an optional connection string.
    ///
    /// Empty and whitespace-only values count as absent.
    pub fn from_database_url(url: Option<String>) -> RepairResult<Self> {
        match url {
            Some(raw) if !raw.trim().is_empty() => Ok(Self {
                database_url: raw.trim().to_string(),
            }),
            _ => Err(RepairError::missing_configuration(format!(
                "{DATABASE_URL_VAR} is not set"
            ))),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_url_is_missing_configuration() {
        let err = Config::from_database_url(None).unwrap_err();
        assert!(matches!(err, RepairError::MissingConfiguration(_)));
    }

    #[test]
    fn blank_url_is_missing_configuration() {
        let err = Config::from_database_url(Some("   ".to_string())).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn present_url_is_trimmed() {
        let cfg =
            Config::from_database_url(Some(" postgres://u:p@host/db \n".to_string())).unwrap();
        assert_eq!(cfg.database_url(), "postgres://u:p@host/db");
    }
}
