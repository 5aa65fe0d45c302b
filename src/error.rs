//! Error types for the engine.

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Every failure a command can produce. Any error aborts the command it was
/// raised from.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("unexpected character {character:?} at position {position}")]
    Lex { character: char, position: usize },

    /// Reported under the same kind as [DbError::Lex].
    #[error("integer literal {literal} is out of range at position {position}")]
    IntegerOutOfRange { literal: String, position: usize },

    #[error("expected {expected}, found {found} at position {position}")]
    Parse {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("table {0:?} already exists")]
    TableExists(String),

    #[error("table {0:?} does not exist")]
    TableNotFound(String),

    #[error("table {0:?} declares more than one PRIMARY KEY column")]
    DuplicatePrimaryKey(String),

    #[error("type mismatch on column {column:?}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("column {0:?} cannot be NULL")]
    NullConstraintViolation(String),

    #[error("UNIQUE constraint violated on column {column:?} for value {value}")]
    UniqueConstraintViolation { column: String, value: String },

    #[error("column {0:?} does not exist")]
    ColumnNotFound(String),

    #[error("column reference {0:?} is ambiguous")]
    AmbiguousColumn(String),

    #[error("expected {expected} values, got {found}")]
    ValueCountMismatch { expected: usize, found: usize },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The caller-facing error object: `{ kind, message, position? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl DbError {
    /// Shorthand for a parse failure.
    pub fn parse(expected: impl Into<String>, found: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            expected: expected.into(),
            found: found.into(),
            position,
        }
    }

    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lex { .. } | Self::IntegerOutOfRange { .. } => "LexError",
            Self::Parse { .. } => "ParseError",
            Self::TableExists(_) => "TableExists",
            Self::TableNotFound(_) => "TableNotFound",
            Self::DuplicatePrimaryKey(_) => "DuplicatePrimaryKey",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::NullConstraintViolation(_) => "NullConstraintViolation",
            Self::UniqueConstraintViolation { .. } => "UniqueConstraintViolation",
            Self::ColumnNotFound(_) => "ColumnNotFound",
            Self::AmbiguousColumn(_) => "AmbiguousColumn",
            Self::ValueCountMismatch { .. } => "ValueCountMismatch",
            Self::InvalidQuery(_) => "InvalidQuery",
            Self::Persistence(_) | Self::Io(_) | Self::Serialization(_) => "PersistenceError",
        }
    }

    /// Source offset of syntax-stage errors.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Lex { position, .. }
            | Self::IntegerOutOfRange { position, .. }
            | Self::Parse { position, .. } => Some(*position),
            _ => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            position: self.position(),
        }
    }
}
