//! Error types for partload.

use crate::schema::ColumnType;
use thiserror::Error;

/// Result type alias for partload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for shared partload types.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{column} is not a valid column in table {table}")]
    UnknownColumn { column: String, table: String },

    #[error("column layout mismatch: {types} types, {defaults} defaults, {width} fields")]
    LayoutMismatch {
        types: usize,
        defaults: usize,
        width: usize,
    },

    // Value errors (20-29)
    #[error("invalid decimal literal: {0:?}")]
    InvalidDecimal(String),

    #[error("row has {actual} fields, expected {expected}")]
    RowWidth { expected: usize, actual: usize },

    #[error("column {column} expects {} values, got {found}", .expected.as_str())]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: &'static str,
    },
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::UnknownColumn { .. } => 11,
            Error::LayoutMismatch { .. } => 12,
            Error::InvalidDecimal(_) => 20,
            Error::RowWidth { .. } => 21,
            Error::TypeMismatch { .. } => 22,
        }
    }
}

/// Failure taxonomy of a partition run.
///
/// Every error that aborts a partition is classified into exactly one kind.
/// `Cleanup` failures are logged and never abort anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Config,
    Setup,
    Launch,
    Execution,
    Write,
    Timeout,
    Archive,
    Publish,
    Cleanup,
}

impl FailureKind {
    /// Stable numeric code, grouped like [`Error::code`].
    pub fn code(self) -> u32 {
        match self {
            FailureKind::Config => 10,
            FailureKind::Setup => 30,
            FailureKind::Launch => 31,
            FailureKind::Execution => 32,
            FailureKind::Write => 33,
            FailureKind::Timeout => 34,
            FailureKind::Archive => 40,
            FailureKind::Publish => 41,
            FailureKind::Cleanup => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Config => "config",
            FailureKind::Setup => "setup",
            FailureKind::Launch => "launch",
            FailureKind::Execution => "execution",
            FailureKind::Write => "write",
            FailureKind::Timeout => "timeout",
            FailureKind::Archive => "archive",
            FailureKind::Publish => "publish",
            FailureKind::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::InvalidDecimal("1e".into()).code(), 20);
        let mismatch = Error::TypeMismatch {
            column: "tags".into(),
            expected: ColumnType::ArrayOfString,
            found: "string",
        };
        assert_eq!(mismatch.code(), 22);
        assert_eq!(
            mismatch.to_string(),
            "column tags expects array of string values, got string"
        );
        assert_eq!(FailureKind::Launch.code(), 31);
        assert_eq!(FailureKind::Publish.code(), 41);
    }

    #[test]
    fn layout_mismatch_display() {
        let err = Error::LayoutMismatch {
            types: 3,
            defaults: 2,
            width: 3,
        };
        assert!(err.to_string().contains("3 types, 2 defaults"));
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(FailureKind::Execution.to_string(), "execution");
    }
}
