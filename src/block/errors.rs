//! Lineage block errors
//!
//! Block failures never surface on the query path (LINEAGE.md §6,
//! L3): the session logs them, counts them, and returns the query
//! result without a block. Codes are stable (LINEAGE.md §7).

use std::fmt;
use std::io;

use crate::observability::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockErrorCode {
    /// A synthetic handle chain revisited an entry during expansion
    ExpansionCycle,
    /// The capture state is internally inconsistent
    Malformed,
    /// The requested block was evicted or never captured
    Stale,
    /// Writing an export stream failed
    ExportFailed,
}

impl BlockErrorCode {
    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            BlockErrorCode::ExpansionCycle => "LIN_EXPANSION_CYCLE",
            BlockErrorCode::Malformed => "LIN_BLOCK_MALFORMED",
            BlockErrorCode::Stale => "LIN_BLOCK_STALE",
            BlockErrorCode::ExportFailed => "LIN_EXPORT_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

/// A block-path failure with a stable code
#[derive(Debug)]
pub struct BlockError {
    code: BlockErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl BlockError {
    pub fn expansion_cycle(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::ExpansionCycle,
            message: message.into(),
            source: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::Malformed,
            message: message.into(),
            source: None,
        }
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::Stale,
            message: message.into(),
            source: None,
        }
    }

    pub fn export_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: BlockErrorCode::ExportFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn code(&self) -> BlockErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BlockError {
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

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type BlockResult<T> = Result<T, BlockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(BlockErrorCode::ExpansionCycle.code(), "LIN_EXPANSION_CYCLE");
        assert_eq!(BlockErrorCode::Malformed.code(), "LIN_BLOCK_MALFORMED");
        assert_eq!(BlockErrorCode::Stale.code(), "LIN_BLOCK_STALE");
        assert_eq!(BlockErrorCode::ExportFailed.code(), "LIN_EXPORT_FAILED");
    }

    #[test]
    fn test_display_carries_severity_and_code() {
        let err = BlockError::stale("query 9: block evicted");
        assert_eq!(
            err.to_string(),
            "[ERROR] LIN_BLOCK_STALE: query 9: block evicted"
        );
    }

    #[test]
    fn test_export_failed_chains_io_source() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = BlockError::export_failed("export to /tmp/x", io);
        assert_eq!(err.code().code(), "LIN_EXPORT_FAILED");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("denied"));
    }
}
