use std::sync::Arc;

use bitvec::prelude::*;

use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::value::Value;

/// Typed, contiguous payload of a column. NULL rows hold a placeholder that is
/// never read back; the column's null bitmap is authoritative.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Int(Vec<i64>),
    /// Shared strings, so reading a row out is a refcount bump.
    Text(Vec<Arc<str>>),
    /// One bit per row.
    Bool(BitVec),
}

impl ColumnData {
    fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Int => Self::Int(Vec::new()),
            DataType::Varchar(_) => Self::Text(Vec::new()),
            DataType::Boolean => Self::Bool(BitVec::new()),
        }
    }

    fn push_placeholder(&mut self) {
        match self {
            Self::Int(values) => values.push(0),
            Self::Text(values) => values.push(Arc::from("")),
            Self::Bool(bits) => bits.push(false),
        }
    }

    fn remove(&mut self, row_idx: usize) {
        match self {
            Self::Int(values) => {
                values.remove(row_idx);
            }
            Self::Text(values) => {
                values.remove(row_idx);
            }
            Self::Bool(bits) => {
                bits.remove(row_idx);
            }
        }
    }
}

/// The values of one declared column across every row of a table, addressed by
/// row position.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub data: ColumnData,
    /// Bit `i` is set when row `i` is NULL.
    pub null_bitmap: BitVec,
}

impl Column {
    pub fn new(name: String, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            data: ColumnData::for_type(data_type),
            null_bitmap: BitVec::new(),
        }
    }

    /// Appends `value` as a new last row.
    ///
    /// # Errors
    /// [DbError::TypeMismatch] if the value does not fit the declared type,
    /// including an over-long `VARCHAR`. Nothing is appended on error.
    ///
    /// # Example
    /// ```
    /// # use minisql::column::Column;
    /// # use minisql::{DataType, Value};
    /// let mut col = Column::new("age".into(), DataType::Int);
    /// col.push(Value::Int(30)).unwrap();
    /// col.push(Value::Null).unwrap();
    ///
    /// assert_eq!(col.len(), 2);
    /// assert!(col.get(1).unwrap().is_null());
    /// ```
    pub fn push(&mut self, value: Value) -> Result<()> {
        self.data_type.validate(&self.name, &value)?;

        let is_null = value.is_null();
        match (&mut self.data, value) {
            (data, Value::Null) => data.push_placeholder(),
            (ColumnData::Int(values), Value::Int(v)) => values.push(v),
            (ColumnData::Text(values), Value::Text(v)) => values.push(v),
            (ColumnData::Bool(bits), Value::Bool(v)) => bits.push(v),
            (_, other) => return Err(mismatch(&self.name, self.data_type, &other)),
        }
        self.null_bitmap.push(is_null);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.null_bitmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.null_bitmap.is_empty()
    }

    /// The value at `row_idx`, or `None` past the last row.
    pub fn get(&self, row_idx: usize) -> Option<Value> {
        if *self.null_bitmap.get(row_idx)? {
            return Some(Value::Null);
        }
        let value = match &self.data {
            ColumnData::Int(values) => Value::Int(values[row_idx]),
            ColumnData::Text(values) => Value::Text(Arc::clone(&values[row_idx])),
            ColumnData::Bool(bits) => Value::Bool(bits[row_idx]),
        };
        Some(value)
    }

    /// Removes row `row_idx`; later rows move down by one. Returns `false`
    /// when there is no such row.
    pub fn remove(&mut self, row_idx: usize) -> bool {
        if row_idx >= self.len() {
            return false;
        }
        self.data.remove(row_idx);
        self.null_bitmap.remove(row_idx);
        true
    }

    /// Overwrites row `row_idx`. Setting NULL only flips the bitmap.
    ///
    /// # Errors
    /// [DbError::TypeMismatch] as for [Column::push]. A missing row is left
    /// alone without error.
    pub fn set(&mut self, row_idx: usize, value: &Value) -> Result<()> {
        self.data_type.validate(&self.name, value)?;
        if row_idx >= self.len() {
            return Ok(());
        }

        match (&mut self.data, value) {
            (_, Value::Null) => {}
            (ColumnData::Int(values), Value::Int(v)) => values[row_idx] = *v,
            (ColumnData::Text(values), Value::Text(v)) => values[row_idx] = Arc::clone(v),
            (ColumnData::Bool(bits), Value::Bool(v)) => bits.set(row_idx, *v),
            (_, other) => return Err(mismatch(&self.name, self.data_type, other)),
        }
        self.null_bitmap.set(row_idx, value.is_null());
        Ok(())
    }
}

fn mismatch(column: &str, data_type: DataType, value: &Value) -> DbError {
    DbError::TypeMismatch {
        column: column.to_string(),
        expected: data_type.to_string(),
        found: value.type_name().to_string(),
    }
}
