use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::value::Value;

/// Length used for a `VARCHAR` declared without `(n)`.
pub const DEFAULT_VARCHAR_LENGTH: usize = 255;

/// Represents the supported data types in the database schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A UTF-8 string holding at most `n` characters.
    Varchar(usize),
    /// A boolean value (true or false).
    Boolean,
}

impl DataType {
    /// Whether `value` has this type's runtime kind, ignoring the `VARCHAR` length.
    /// `NULL` is compatible with every type.
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Int, Value::Int(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Varchar(_), Value::Text(_))
        )
    }

    /// Checks that `value` may be stored in a column of this type.
    ///
    /// `NULL` is accepted by every type; nullability is a constraint, not a type.
    /// No coercion is attempted: an integer literal never fits a `VARCHAR`.
    pub fn validate(&self, column: &str, value: &Value) -> Result<()> {
        if !self.is_compatible(value) {
            return Err(DbError::TypeMismatch {
                column: column.to_string(),
                expected: self.to_string(),
                found: value.type_name().to_string(),
            });
        }
        if let (Self::Varchar(max), Value::Text(s)) = (self, value) {
            let len = s.chars().count();
            if len > *max {
                return Err(DbError::TypeMismatch {
                    column: column.to_string(),
                    expected: self.to_string(),
                    found: format!("text of {len} characters"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Varchar(n) => write!(f, "VARCHAR({n})"),
            Self::Boolean => write!(f, "BOOLEAN"),
        }
    }
}
