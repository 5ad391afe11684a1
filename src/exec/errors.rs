//! Executor error types
//!
//! Per LINEAGE.md §7, these are real query failures, not capture
//! diagnostics. Error codes:
//! - LIN_EXEC_FAILED (ERROR)
//! - LIN_EXEC_UNKNOWN_RELATION (ERROR)
//! - LIN_EXEC_INVALID_ROW (ERROR)

use std::fmt;

use crate::observability::Severity;

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecErrorCode {
    /// General execution failure
    ExecFailed,
    /// Referenced relation does not exist
    UnknownRelation,
    /// Inserted value is not a flat object
    InvalidRow,
}

impl ExecErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecErrorCode::ExecFailed => "LIN_EXEC_FAILED",
            ExecErrorCode::UnknownRelation => "LIN_EXEC_UNKNOWN_RELATION",
            ExecErrorCode::InvalidRow => "LIN_EXEC_INVALID_ROW",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for ExecErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug)]
pub struct ExecError {
    /// Error code
    code: ExecErrorCode,
    /// Human-readable message
    message: String,
}

impl ExecError {
    /// Create a general execution failure
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecErrorCode::ExecFailed,
            message: reason.into(),
        }
    }

    /// Create an unknown relation error
    pub fn unknown_relation(name: impl Into<String>) -> Self {
        Self {
            code: ExecErrorCode::UnknownRelation,
            message: format!("relation '{}' does not exist", name.into()),
        }
    }

    /// Create an invalid row error
    pub fn invalid_row(reason: impl Into<String>) -> Self {
        Self {
            code: ExecErrorCode::InvalidRow,
            message: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ExecErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecError {}

/// Result type for executor operations
pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecErrorCode::ExecFailed.code(), "LIN_EXEC_FAILED");
        assert_eq!(
            ExecErrorCode::UnknownRelation.code(),
            "LIN_EXEC_UNKNOWN_RELATION"
        );
        assert_eq!(ExecErrorCode::InvalidRow.code(), "LIN_EXEC_INVALID_ROW");
    }

    #[test]
    fn test_all_exec_errors_are_error_severity() {
        assert_eq!(ExecErrorCode::ExecFailed.severity(), Severity::Error);
        assert_eq!(ExecErrorCode::UnknownRelation.severity(), Severity::Error);
        assert_eq!(ExecErrorCode::InvalidRow.severity(), Severity::Error);
    }

    #[test]
    fn test_error_display() {
        let err = ExecError::unknown_relation("ghost");
        let display = format!("{}", err);
        assert!(display.contains("LIN_EXEC_UNKNOWN_RELATION"));
        assert!(display.contains("ERROR"));
        assert!(display.contains("ghost"));
    }
}
