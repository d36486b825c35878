//! Repair error model.

use thiserror::Error;

/// Result type used across the repair layers.
pub type RepairResult<T> = Result<T, RepairError>;

/// Repair-level error.
///
/// Keep this focused on the two failure classes the reconciler distinguishes:
/// missing configuration (a precondition, handled gracefully) and individual
/// statement failures (caught per step, logged, execution continues).
/// Anything escaping both is an uncaught failure and belongs to the binary's
/// top-level handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// Required configuration is absent (e.g. no connection string).
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// A single SQL statement failed (syntax, constraint, connectivity blip).
    #[error("statement failed during {operation}: {message}")]
    Statement { operation: String, message: String },

    /// A precondition for a step was not met (e.g. target table absent).
    #[error("precondition not met: {0}")]
    Precondition(String),
}

impl RepairError {
    pub fn missing_configuration(msg: impl Into<String>) -> Self {
        Self::MissingConfiguration(msg.into())
    }

    pub fn statement(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Statement {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Whether this error aborts the whole run (vs. being logged per step).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingConfiguration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_errors_are_not_fatal() {
        let err = RepairError::statement("ensure_column", "type mismatch");
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "statement failed during ensure_column: type mismatch"
        );
    }

    #[test]
    fn missing_configuration_is_fatal() {
        assert!(RepairError::missing_configuration("DATABASE_URL not set").is_fatal());
    }
}
