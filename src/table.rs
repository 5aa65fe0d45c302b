use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::index::HashIndex;
use crate::value::Value;

/// A row, aligned to the table's column order.
pub type Row = Vec<Value>;

/// Constraint flags declared on a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub primary_key: bool,
    pub unique: bool,
    pub not_null: bool,
}

impl Constraints {
    /// PRIMARY KEY implies UNIQUE.
    pub fn is_unique(&self) -> bool {
        self.primary_key || self.unique
    }

    /// PRIMARY KEY implies NOT NULL.
    pub fn is_not_null(&self) -> bool {
        self.primary_key || self.not_null
    }
}

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: Constraints,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Constraints::default(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.constraints.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraints.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.not_null = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A table stored column by column, with one hash index per
/// PRIMARY KEY / UNIQUE column. Row positions follow insertion order.
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub columns: Vec<Column>,
    pub row_count: usize,
    /// Parallel to `columns`; `Some` for indexed columns.
    indexes: Vec<Option<HashIndex>>,
}

impl Table {
    /// Builds an empty table.
    ///
    /// # Errors
    /// - [DbError::DuplicatePrimaryKey] if more than one column is a PRIMARY KEY.
    /// - [DbError::InvalidQuery] if two columns share a name or the list is empty.
    pub fn new(name: String, schema: Schema) -> Result<Self> {
        if schema.columns.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "table {name:?} must declare at least one column"
            )));
        }
        let primary_keys = schema
            .columns
            .iter()
            .filter(|c| c.constraints.primary_key)
            .count();
        if primary_keys > 1 {
            return Err(DbError::DuplicatePrimaryKey(name));
        }
        let mut seen = HashSet::new();
        for col in &schema.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DbError::InvalidQuery(format!(
                    "column {:?} is declared twice in table {name:?}",
                    col.name
                )));
            }
        }

        let columns = schema
            .columns
            .iter()
            .map(|column| Column::new(column.name.clone(), column.data_type))
            .collect();
        let indexes = schema
            .columns
            .iter()
            .map(|c| c.constraints.is_unique().then(HashIndex::new))
            .collect();

        Ok(Self {
            name,
            schema,
            columns,
            row_count: 0,
            indexes,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.position(name)
    }

    /// Index over the column at `col_idx`, if the column is PRIMARY KEY or UNIQUE.
    pub fn index(&self, col_idx: usize) -> Option<&HashIndex> {
        self.indexes.get(col_idx).and_then(Option::as_ref)
    }

    /// Inserts a new row, enforcing types, NOT NULL and uniqueness.
    /// The table is untouched when an error is returned.
    pub fn insert(&mut self, values: Row) -> Result<()> {
        if values.len() != self.schema.columns.len() {
            return Err(DbError::ValueCountMismatch {
                expected: self.schema.columns.len(),
                found: values.len(),
            });
        }

        for (def, value) in self.schema.columns.iter().zip(&values) {
            def.data_type.validate(&def.name, value)?;
            if value.is_null() && def.constraints.is_not_null() {
                return Err(DbError::NullConstraintViolation(def.name.clone()));
            }
        }
        for (col_idx, value) in values.iter().enumerate() {
            if self.index(col_idx).is_some_and(|idx| idx.contains(value)) {
                return Err(self.unique_violation(col_idx, value));
            }
        }

        let row_idx = self.row_count;
        for (col_idx, value) in values.into_iter().enumerate() {
            if let Some(index) = &mut self.indexes[col_idx] {
                index.insert(value.clone(), row_idx);
            }
            self.columns[col_idx].push(value)?;
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn get_row(&self, row_idx: usize) -> Option<Row> {
        if self.row_count <= row_idx {
            return None;
        }
        self.columns
            .iter()
            .map(|col| col.get(row_idx)) // -> Option<Value>
            .collect()
    }

    /// Every row in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.row_count).filter_map(|i| self.get_row(i))
    }

    /// Applies the same `assignments` (column position, new value) to every row in
    /// `positions`, all or nothing.
    ///
    /// Every staged row is checked as if freshly inserted: type, NOT NULL, and
    /// uniqueness against the index (ignoring the rows being rewritten) and among
    /// the rewritten rows themselves. Nothing is written until every row passes.
    pub fn update_rows(&mut self, positions: &[usize], assignments: &[(usize, Value)]) -> Result<usize> {
        // Value checks do not depend on which rows match.
        for (col_idx, value) in assignments {
            let def = &self.schema.columns[*col_idx];
            def.data_type.validate(&def.name, value)?;
            if value.is_null() && def.constraints.is_not_null() {
                return Err(DbError::NullConstraintViolation(def.name.clone()));
            }
        }

        let targets: HashSet<usize> = positions
            .iter()
            .copied()
            .filter(|&i| i < self.row_count)
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        for (col_idx, value) in assignments {
            let Some(index) = self.index(*col_idx) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            // one literal for every row: two rewritten rows would collide
            if targets.len() > 1 {
                return Err(self.unique_violation(*col_idx, value));
            }
            if index.get(value).is_some_and(|owner| !targets.contains(&owner)) {
                return Err(self.unique_violation(*col_idx, value));
            }
        }

        // Commit: every check passed, column writes cannot fail from here.
        for &row_idx in &targets {
            for (col_idx, value) in assignments {
                let old = self.columns[*col_idx].get(row_idx).unwrap_or(Value::Null);
                if let Some(index) = &mut self.indexes[*col_idx] {
                    if index.get(&old) == Some(row_idx) {
                        index.remove(&old);
                    }
                    index.insert(value.clone(), row_idx);
                }
                self.columns[*col_idx].set(row_idx, value)?;
            }
        }
        Ok(targets.len())
    }

    /// Removes the rows at `positions` and rebuilds every index, since later
    /// rows shift down.
    pub fn delete_rows(&mut self, mut positions: Vec<usize>) -> usize {
        // descending so that a removal never shifts a row still scheduled for deletion
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        let mut removed = 0;
        for row_idx in positions {
            if row_idx >= self.row_count {
                continue;
            }
            for column in &mut self.columns {
                column.remove(row_idx);
            }
            self.row_count -= 1;
            removed += 1;
        }
        if removed > 0 {
            self.rebuild_indexes();
        }
        removed
    }

    fn rebuild_indexes(&mut self) {
        for (col_idx, slot) in self.indexes.iter_mut().enumerate() {
            let Some(index) = slot else {
                continue;
            };
            index.clear();
            let column = &self.columns[col_idx];
            for row_idx in 0..column.len() {
                if let Some(value) = column.get(row_idx) {
                    index.insert(value, row_idx);
                }
            }
        }
    }

    fn unique_violation(&self, col_idx: usize, value: &Value) -> DbError {
        DbError::UniqueConstraintViolation {
            column: self.schema.columns[col_idx].name.clone(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn value_positions(table: &Table, col_idx: usize) -> HashMap<Value, usize> {
        (0..table.row_count)
            .filter_map(|i| table.columns[col_idx].get(i).map(|v| (v, i)))
            .filter(|(v, _)| !v.is_null())
            .collect()
    }

    fn users() -> Table {
        let schema = Schema {
            columns: vec![
                ColumnDef::new("id", DataType::Int).primary_key(),
                ColumnDef::new("email", DataType::Varchar(20)).unique(),
                ColumnDef::new("name", DataType::Varchar(10)).not_null(),
            ],
        };
        Table::new("users".into(), schema).unwrap()
    }

    fn row(id: i64, email: &str, name: &str) -> Row {
        vec![Value::Int(id), Value::from(email), Value::from(name)]
    }

    fn assert_indexes_consistent(table: &Table) {
        for col_idx in 0..table.columns.len() {
            if let Some(index) = table.index(col_idx) {
                let expected = value_positions(table, col_idx);
                assert_eq!(index.len(), expected.len());
                for (value, pos) in expected {
                    assert_eq!(index.get(&value), Some(pos));
                }
            }
        }
    }

    #[test]
    fn test_table_creation() {
        let table = users();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.row_count, 0);
        assert!(table.index(0).is_some());
        assert!(table.index(1).is_some());
        assert!(table.index(2).is_none());
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let schema = Schema {
            columns: vec![
                ColumnDef::new("a", DataType::Int).primary_key(),
                ColumnDef::new("b", DataType::Int).primary_key(),
            ],
        };
        let err = Table::new("t".into(), schema).err().unwrap();
        assert!(matches!(err, DbError::DuplicatePrimaryKey(_)));
    }

    #[test]
    fn test_duplicate_column_name_rejected() {
        let schema = Schema {
            columns: vec![
                ColumnDef::new("a", DataType::Int),
                ColumnDef::new("a", DataType::Boolean),
            ],
        };
        assert!(Table::new("t".into(), schema).is_err());
    }

    #[test]
    fn test_table_insert_and_get() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();
        table.insert(row(2, "b@x", "Bob")).unwrap();

        assert_eq!(table.row_count, 2);
        assert_eq!(table.get_row(1), Some(row(2, "b@x", "Bob")));
        assert_eq!(table.rows().count(), 2);
        assert_indexes_consistent(&table);
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut table = users();
        let err = table.insert(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            DbError::ValueCountMismatch {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn test_unique_violation_leaves_table_unchanged() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();

        let err = table.insert(row(1, "other@x", "Bob")).unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { ref column, .. } if column == "id"));

        let err = table.insert(row(2, "a@x", "Bob")).unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { ref column, .. } if column == "email"));

        assert_eq!(table.row_count, 1);
        assert_eq!(table.columns[1].len(), 1);
    }

    #[test]
    fn test_not_null_and_primary_key_nullability() {
        let mut table = users();
        let err = table
            .insert(vec![Value::Int(1), Value::Null, Value::Null])
            .unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(ref c) if c == "name"));

        let err = table
            .insert(vec![Value::Null, Value::Null, Value::from("x")])
            .unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(ref c) if c == "id"));

        // UNIQUE alone allows several NULLs
        table.insert(vec![Value::Int(1), Value::Null, Value::from("x")]).unwrap();
        table.insert(vec![Value::Int(2), Value::Null, Value::from("y")]).unwrap();
        assert_eq!(table.row_count, 2);
    }

    #[test]
    fn test_update_rows_is_all_or_nothing() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();
        table.insert(row(2, "b@x", "Bob")).unwrap();

        // both rows would receive the same email
        let err = table
            .update_rows(&[0, 1], &[(1, Value::from("same@x"))])
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));
        assert_eq!(table.get_row(0), Some(row(1, "a@x", "Alice")));
        assert_eq!(table.get_row(1), Some(row(2, "b@x", "Bob")));

        // a row may keep its own unique value
        assert_eq!(table.update_rows(&[1], &[(1, Value::from("b@x"))]).unwrap(), 1);

        let err = table.update_rows(&[1], &[(0, Value::Int(1))]).unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));

        table.update_rows(&[1], &[(0, Value::Int(5))]).unwrap();
        assert_eq!(table.index(0).unwrap().get(&Value::Int(5)), Some(1));
        assert!(!table.index(0).unwrap().contains(&Value::Int(2)));
        assert_indexes_consistent(&table);
    }

    #[test]
    fn test_update_rows_rejects_null_in_required_columns() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();

        let err = table.update_rows(&[0], &[(0, Value::Null)]).unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(ref c) if c == "id"));
        let err = table.update_rows(&[0], &[(2, Value::Null)]).unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(ref c) if c == "name"));
        assert_eq!(table.get_row(0), Some(row(1, "a@x", "Alice")));
        assert_indexes_consistent(&table);

        // UNIQUE alone may be cleared
        assert_eq!(table.update_rows(&[0], &[(1, Value::Null)]).unwrap(), 1);
        assert!(table.index(1).unwrap().is_empty());
    }

    #[test]
    fn test_update_rows_checks_values_without_matches() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();

        let err = table.update_rows(&[], &[(2, Value::Int(5))]).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch { .. }));
        let err = table.update_rows(&[], &[(2, Value::Null)]).unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(_)));

        assert_eq!(table.update_rows(&[], &[(2, Value::from("Bob"))]).unwrap(), 0);
    }

    #[test]
    fn test_delete_rows_rebuilds_indexes() {
        let mut table = users();
        table.insert(row(1, "a@x", "Alice")).unwrap();
        table.insert(row(2, "b@x", "Bob")).unwrap();
        table.insert(row(3, "c@x", "Carol")).unwrap();

        assert_eq!(table.delete_rows(vec![0, 2]), 2);
        assert_eq!(table.row_count, 1);
        assert_eq!(table.get_row(0), Some(row(2, "b@x", "Bob")));
        assert_eq!(table.index(0).unwrap().get(&Value::Int(2)), Some(0));
        assert!(!table.index(0).unwrap().contains(&Value::Int(1)));
        assert_indexes_consistent(&table);

        // freed key can be reused
        table.insert(row(1, "a@x", "Alice")).unwrap();
        assert_indexes_consistent(&table);
    }
}
