use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;
use std::ops::Range;
use std::rc::Rc;

use crate::ast::{ComparisonOp, Expr};
use crate::error::{DbError, Result};
use crate::persistence::{Persistence, TableSnapshot};
use crate::table::{ColumnDef, Row, Schema, Table};
use crate::value::Value;

/// How `select` reaches its candidate rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    FullScan,
    /// Direct lookup through the hash index of `column`.
    IndexLookup { column: String },
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullScan => write!(f, "full scan"),
            Self::IndexLookup { column } => write!(f, "index lookup on {column}"),
        }
    }
}

/// A comparison resolved against one table's schema.
#[derive(Debug, Clone)]
struct BoundComparison {
    col_idx: usize,
    op: ComparisonOp,
    value: Value,
}

#[derive(Debug, Clone)]
enum Candidates {
    Scan(Range<usize>),
    Lookup(Option<usize>),
}

impl Iterator for Candidates {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Scan(range) => range.next(),
            Self::Lookup(slot) => slot.take(),
        }
    }
}

/// Lazy sequence of the rows of one table matching a predicate, in insertion
/// order. Cloning yields an independent cursor starting from the same point.
#[derive(Clone)]
pub struct Rows<'a> {
    table: &'a Table,
    predicate: Rc<[BoundComparison]>,
    candidates: Candidates,
    path: AccessPath,
}

impl<'a> Rows<'a> {
    pub fn access_path(&self) -> &AccessPath {
        &self.path
    }

    /// Positions of the remaining matching rows instead of their values.
    pub fn positions(self) -> impl Iterator<Item = usize> + 'a {
        let Rows {
            table,
            predicate,
            candidates,
            ..
        } = self;
        candidates.filter(move |&row_idx| matches_row(table, &predicate, row_idx))
    }
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        for row_idx in self.candidates.by_ref() {
            if matches_row(self.table, &self.predicate, row_idx) {
                return self.table.get_row(row_idx);
            }
        }
        None
    }
}

fn matches_row(table: &Table, predicate: &[BoundComparison], row_idx: usize) -> bool {
    predicate.iter().all(|cmp| {
        let cell = table.columns[cmp.col_idx]
            .get(row_idx)
            .unwrap_or(Value::Null);
        compare(&cell, cmp.op, &cmp.value)
    })
}

/// Evaluates `cell op literal`.
///
/// `= NULL` matches NULL cells and `!= NULL` matches everything else. Ordering
/// operators involving NULL are false, and a NULL cell differs from any
/// non-NULL literal. Values of different kinds are never equal and never ordered.
pub fn compare(cell: &Value, op: ComparisonOp, literal: &Value) -> bool {
    match (cell.is_null(), literal.is_null()) {
        (_, true) => match op {
            ComparisonOp::Eq => cell.is_null(),
            ComparisonOp::NotEq => !cell.is_null(),
            _ => false,
        },
        (true, false) => op == ComparisonOp::NotEq,
        (false, false) => {
            if mem::discriminant(cell) != mem::discriminant(literal) {
                return op == ComparisonOp::NotEq;
            }
            let ord = cell.cmp(literal);
            match op {
                ComparisonOp::Eq => ord.is_eq(),
                ComparisonOp::NotEq => ord.is_ne(),
                ComparisonOp::Lt => ord.is_lt(),
                ComparisonOp::LtEq => ord.is_le(),
                ComparisonOp::Gt => ord.is_gt(),
                ComparisonOp::GtEq => ord.is_ge(),
            }
        }
    }
}

/// Owns every table and, when opened over a [Persistence] adapter, writes each
/// change through to it.
pub struct StorageEngine {
    tables: HashMap<String, Table>,
    /// `None` in memory-only mode: nothing is snapshotted or saved.
    persistence: Option<Box<dyn Persistence>>,
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// An empty, memory-only engine.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            persistence: None,
        }
    }

    /// Rebuilds every table stored by `persistence`. Rows go through the usual
    /// constraint checks; nothing is written back while loading.
    pub fn open(persistence: Box<dyn Persistence>) -> Result<Self> {
        let mut tables = HashMap::new();
        for snapshot in persistence.load_all()? {
            let TableSnapshot {
                name,
                columns,
                rows,
            } = snapshot;
            let mut table = Table::new(name.clone(), Schema { columns })?;
            for row in rows {
                table.insert(row)?;
            }
            tracing::debug!(table = %name, rows = table.row_count, "loaded table");
            tables.insert(name, table);
        }
        tracing::info!(tables = tables.len(), "storage engine opened");
        Ok(Self {
            tables,
            persistence: Some(persistence),
        })
    }

    pub fn persistence(&self) -> Option<&dyn Persistence> {
        self.persistence.as_deref()
    }

    pub fn into_persistence(self) -> Option<Box<dyn Persistence>> {
        self.persistence
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Table names in alphabetical order.
    pub fn list_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn describe(&self, name: &str) -> Result<&[ColumnDef]> {
        Ok(&self.table(name)?.schema.columns)
    }

    /// # Errors
    /// [DbError::TableExists], or any error from [Table::new].
    pub fn create_table(&mut self, name: String, columns: Vec<ColumnDef>) -> Result<()> {
        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }
        let table = Table::new(name.clone(), Schema { columns })?;
        self.tables.insert(name.clone(), table);
        tracing::info!(table = %name, "table created");
        self.persist(&name)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.tables.remove(name).is_none() {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        tracing::info!(table = %name, "table dropped");
        let Some(persistence) = self.persistence.as_mut() else {
            return Ok(());
        };
        persistence.drop_table(name).map_err(|e| {
            tracing::warn!("Failed to drop table {} from persistence: {}", name, e);
            DbError::Persistence(e.to_string())
        })
    }

    /// Appends one row in column order. Returns the number of rows inserted.
    pub fn insert(&mut self, table: &str, row: Row) -> Result<usize> {
        self.table_mut(table)?.insert(row)?;
        self.persist(table)?;
        Ok(1)
    }

    /// Rows of `table` matching `predicate`.
    ///
    /// When a conjunct is an equality on a PRIMARY KEY or UNIQUE column against a
    /// non-NULL literal, the candidate set comes from that column's index and
    /// holds at most one row. Otherwise every row is scanned.
    pub fn select(&self, table: &str, predicate: Option<&Expr>) -> Result<Rows<'_>> {
        let table = self.table(table)?;
        let bound = bind_predicate(table, predicate)?;

        let lookup = bound.iter().find_map(|cmp| {
            if cmp.op != ComparisonOp::Eq || cmp.value.is_null() {
                return None;
            }
            let index = table.index(cmp.col_idx)?;
            Some((cmp.col_idx, index.get(&cmp.value)))
        });
        let (candidates, path) = match lookup {
            Some((col_idx, hit)) => (
                Candidates::Lookup(hit),
                AccessPath::IndexLookup {
                    column: table.schema.columns[col_idx].name.clone(),
                },
            ),
            None => (Candidates::Scan(0..table.row_count), AccessPath::FullScan),
        };
        tracing::debug!(table = %table.name, path = %path, "select");

        Ok(Rows {
            table,
            predicate: bound.into(),
            candidates,
            path,
        })
    }

    /// Sets `assignments` on every row matching `predicate`. Either every
    /// matching row is rewritten or, on error, none is.
    pub fn update(
        &mut self,
        table: &str,
        predicate: Option<&Expr>,
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let positions: Vec<usize> = self.select(table, predicate)?.positions().collect();

        let target = self.table_mut(table)?;
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            let col_idx = target
                .column_index(name)
                .ok_or_else(|| DbError::ColumnNotFound(name.clone()))?;
            if !seen.insert(col_idx) {
                return Err(DbError::InvalidQuery(format!(
                    "column {name:?} is assigned more than once"
                )));
            }
            resolved.push((col_idx, value.clone()));
        }

        let updated = target.update_rows(&positions, &resolved)?;
        tracing::debug!(table, updated, "update");
        if updated > 0 {
            self.persist(table)?;
        }
        Ok(updated)
    }

    /// Removes every row matching `predicate`.
    pub fn delete(&mut self, table: &str, predicate: Option<&Expr>) -> Result<usize> {
        let positions: Vec<usize> = self.select(table, predicate)?.positions().collect();
        let deleted = self.table_mut(table)?.delete_rows(positions);
        tracing::debug!(table, deleted, "delete");
        if deleted > 0 {
            self.persist(table)?;
        }
        Ok(deleted)
    }

    fn persist(&mut self, name: &str) -> Result<()> {
        let Some(persistence) = self.persistence.as_mut() else {
            return Ok(());
        };
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        persistence.save_table(&TableSnapshot::of(table)).map_err(|e| {
            tracing::warn!("Failed to persist table {}: {}", name, e);
            DbError::Persistence(e.to_string())
        })
    }
}

/// Resolves every comparison of `predicate` against `table`: a qualifier must
/// name the table itself, the column must exist, and the literal must have the
/// column's kind.
fn bind_predicate(table: &Table, predicate: Option<&Expr>) -> Result<Vec<BoundComparison>> {
    let Some(expr) = predicate else {
        return Ok(Vec::new());
    };
    expr.conjuncts()
        .into_iter()
        .map(|(column, op, value)| {
            if column.table.as_ref().is_some_and(|t| *t != table.name) {
                return Err(DbError::ColumnNotFound(column.to_string()));
            }
            let col_idx = table
                .column_index(&column.column)
                .ok_or_else(|| DbError::ColumnNotFound(column.to_string()))?;
            let def = &table.schema.columns[col_idx];
            if !def.data_type.is_compatible(value) {
                return Err(DbError::TypeMismatch {
                    column: def.name.clone(),
                    expected: def.data_type.to_string(),
                    found: value.type_name().to_string(),
                });
            }
            Ok(BoundComparison {
                col_idx,
                op,
                value: value.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ColumnRef;
    use crate::data_type::DataType;
    use crate::persistence::MemoryStore;

    fn eq(column: &str, value: Value) -> Expr {
        cmp(column, ComparisonOp::Eq, value)
    }

    fn cmp(column: &str, op: ComparisonOp, value: Value) -> Expr {
        Expr::Comparison {
            column: ColumnRef::new(column),
            op,
            value,
        }
    }

    fn and(left: Expr, right: Expr) -> Expr {
        Expr::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn engine() -> StorageEngine {
        with_users(StorageEngine::new())
    }

    fn stored_engine() -> StorageEngine {
        with_users(StorageEngine::open(Box::new(MemoryStore::new())).unwrap())
    }

    fn with_users(mut engine: StorageEngine) -> StorageEngine {
        engine
            .create_table(
                "users".into(),
                vec![
                    ColumnDef::new("id", DataType::Int).primary_key(),
                    ColumnDef::new("name", DataType::Varchar(10)).not_null(),
                    ColumnDef::new("age", DataType::Int),
                ],
            )
            .unwrap();
        for (id, name, age) in [(1, "alice", 30), (2, "bob", 25), (3, "carol", 30)] {
            engine
                .insert("users", vec![Value::Int(id), Value::from(name), Value::Int(age)])
                .unwrap();
        }
        engine
    }

    // ─── compare ────────────────────────────────────────────────

    #[test]
    fn test_compare_null_semantics() {
        let null = Value::Null;
        let one = Value::Int(1);
        assert!(compare(&null, ComparisonOp::Eq, &null));
        assert!(!compare(&one, ComparisonOp::Eq, &null));
        assert!(compare(&one, ComparisonOp::NotEq, &null));
        assert!(!compare(&null, ComparisonOp::NotEq, &null));
        assert!(compare(&null, ComparisonOp::NotEq, &one));
        assert!(!compare(&null, ComparisonOp::Lt, &one));
        assert!(!compare(&one, ComparisonOp::GtEq, &null));
    }

    #[test]
    fn test_compare_values() {
        assert!(compare(&Value::Int(2), ComparisonOp::Gt, &Value::Int(1)));
        assert!(compare(&Value::Int(2), ComparisonOp::LtEq, &Value::Int(2)));
        assert!(compare(&Value::from("b"), ComparisonOp::Gt, &Value::from("a")));
        assert!(!compare(&Value::Int(1), ComparisonOp::Lt, &Value::from("a")));
        assert!(compare(&Value::Int(1), ComparisonOp::NotEq, &Value::Bool(true)));
    }

    // ─── tables ────────────────────────────────────────────────

    #[test]
    fn test_create_and_drop() {
        let mut engine = engine();
        let err = engine
            .create_table("users".into(), vec![ColumnDef::new("x", DataType::Int)])
            .unwrap_err();
        assert!(matches!(err, DbError::TableExists(_)));

        engine
            .create_table("accounts".into(), vec![ColumnDef::new("x", DataType::Int)])
            .unwrap();
        assert_eq!(engine.list_tables(), vec!["accounts", "users"]);
        assert_eq!(engine.describe("users").unwrap().len(), 3);

        engine.drop_table("users").unwrap();
        assert!(matches!(
            engine.drop_table("users"),
            Err(DbError::TableNotFound(_))
        ));
        assert!(matches!(
            engine.select("users", None),
            Err(DbError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let mut engine = StorageEngine::new();
        let err = engine
            .create_table(
                "t".into(),
                vec![
                    ColumnDef::new("a", DataType::Int).primary_key(),
                    ColumnDef::new("b", DataType::Int).primary_key(),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicatePrimaryKey(_)));
        assert!(engine.list_tables().is_empty());
    }

    // ─── select ────────────────────────────────────────────────

    #[test]
    fn test_select_all_in_insertion_order() {
        let engine = engine();
        let ids: Vec<Value> = engine
            .select("users", None)
            .unwrap()
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_select_uses_index_for_key_equality() {
        let engine = engine();
        let rows = engine.select("users", Some(&eq("id", Value::Int(2)))).unwrap();
        assert_eq!(
            rows.access_path(),
            &AccessPath::IndexLookup {
                column: "id".into()
            }
        );
        let found: Vec<Row> = rows.collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0][1], Value::from("bob"));

        let missing = engine.select("users", Some(&eq("id", Value::Int(9)))).unwrap();
        assert_eq!(missing.count(), 0);
    }

    #[test]
    fn test_select_uses_index_for_unique_column() {
        let mut engine = StorageEngine::new();
        engine
            .create_table(
                "accounts".into(),
                vec![
                    ColumnDef::new("id", DataType::Int).primary_key(),
                    ColumnDef::new("email", DataType::Varchar(20)).unique(),
                ],
            )
            .unwrap();
        for (id, email) in [(1, Value::from("a@x")), (2, Value::Null), (3, Value::from("c@x"))] {
            engine.insert("accounts", vec![Value::Int(id), email]).unwrap();
        }

        let rows = engine
            .select("accounts", Some(&eq("email", Value::from("c@x"))))
            .unwrap();
        assert_eq!(
            rows.access_path(),
            &AccessPath::IndexLookup {
                column: "email".into()
            }
        );
        assert_eq!(rows.collect::<Vec<Row>>(), vec![vec![Value::Int(3), Value::from("c@x")]]);

        // NULL is never indexed, so `= NULL` scans
        let nulls = engine.select("accounts", Some(&eq("email", Value::Null))).unwrap();
        assert_eq!(nulls.access_path(), &AccessPath::FullScan);
        assert_eq!(nulls.count(), 1);
    }

    #[test]
    fn test_index_and_scan_agree() {
        let engine = engine();
        let by_index: Vec<Row> = engine
            .select("users", Some(&and(eq("age", Value::Int(30)), eq("id", Value::Int(3)))))
            .unwrap()
            .collect();
        let by_scan: Vec<Row> = engine
            .select("users", Some(&and(eq("age", Value::Int(30)), cmp("id", ComparisonOp::GtEq, Value::Int(3)))))
            .unwrap()
            .collect();
        assert_eq!(by_index, by_scan);
        assert_eq!(by_index.len(), 1);

        // remaining conjuncts still filter the indexed candidate
        let none = engine
            .select("users", Some(&and(eq("id", Value::Int(2)), eq("age", Value::Int(30)))))
            .unwrap();
        assert_eq!(none.count(), 0);
    }

    #[test]
    fn test_select_full_scan_for_other_predicates() {
        let engine = engine();
        let rows = engine.select("users", Some(&eq("age", Value::Int(30)))).unwrap();
        assert_eq!(rows.access_path(), &AccessPath::FullScan);
        assert_eq!(rows.count(), 2);
    }

    #[test]
    fn test_rows_are_restartable() {
        let engine = engine();
        let rows = engine
            .select("users", Some(&cmp("age", ComparisonOp::Lt, Value::Int(30))))
            .unwrap();
        let first: Vec<Row> = rows.clone().collect();
        let second: Vec<Row> = rows.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_select_binding_errors() {
        let engine = engine();
        assert!(matches!(
            engine.select("users", Some(&eq("nope", Value::Int(1)))),
            Err(DbError::ColumnNotFound(_))
        ));
        assert!(matches!(
            engine.select("users", Some(&eq("id", Value::from("1")))),
            Err(DbError::TypeMismatch { .. })
        ));
        let foreign = Expr::Comparison {
            column: ColumnRef::qualified("orders", "id"),
            op: ComparisonOp::Eq,
            value: Value::Int(1),
        };
        assert!(matches!(
            engine.select("users", Some(&foreign)),
            Err(DbError::ColumnNotFound(_))
        ));
    }

    // ─── update / delete ────────────────────────────────────────

    #[test]
    fn test_update_and_delete_counts() {
        let mut engine = engine();
        let updated = engine
            .update("users", Some(&eq("age", Value::Int(30))), &[("age".into(), Value::Int(31))])
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = engine.delete("users", Some(&eq("age", Value::Int(31)))).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(engine.select("users", None).unwrap().count(), 1);
        assert_eq!(engine.delete("users", Some(&eq("id", Value::Int(42)))).unwrap(), 0);
    }

    #[test]
    fn test_update_failure_changes_nothing() {
        let mut engine = engine();
        let err = engine
            .update("users", None, &[("id".into(), Value::Int(7))])
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));

        let err = engine
            .update("users", None, &[("missing".into(), Value::Int(7))])
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound(_)));

        let ids: Vec<Value> = engine
            .select("users", None)
            .unwrap()
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_deleted_key_can_be_reinserted() {
        let mut engine = engine();
        engine.delete("users", Some(&eq("id", Value::Int(1)))).unwrap();
        assert_eq!(engine.select("users", Some(&eq("id", Value::Int(1)))).unwrap().count(), 0);
        engine
            .insert("users", vec![Value::Int(1), Value::from("dave"), Value::Null])
            .unwrap();
        assert_eq!(engine.select("users", Some(&eq("id", Value::Int(1)))).unwrap().count(), 1);
    }

    // ─── persistence ────────────────────────────────────────────

    #[test]
    fn test_memory_only_engine_keeps_no_copy() {
        let mut engine = engine();
        engine.delete("users", Some(&eq("id", Value::Int(2)))).unwrap();
        engine.drop_table("users").unwrap();
        assert!(engine.persistence().is_none());
        assert!(engine.into_persistence().is_none());
    }

    #[test]
    fn test_write_through_and_reload() {
        let mut engine = stored_engine();
        engine.delete("users", Some(&eq("id", Value::Int(2)))).unwrap();

        let store = engine.into_persistence().unwrap();
        let snapshots = store.load_all().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].rows.len(), 2);

        let mut reloaded = StorageEngine::open(store).unwrap();
        assert_eq!(reloaded.select("users", None).unwrap().count(), 2);
        // constraints survive the reload
        let err = reloaded
            .insert("users", vec![Value::Int(1), Value::from("x"), Value::Null])
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));
    }

    #[test]
    fn test_drop_is_written_through() {
        let mut engine = stored_engine();
        assert_eq!(engine.persistence().unwrap().load_all().unwrap().len(), 1);
        engine.drop_table("users").unwrap();
        assert!(engine.persistence().unwrap().load_all().unwrap().is_empty());
    }

    #[test]
    fn test_reload_rejects_corrupt_rows() {
        let snapshot = TableSnapshot {
            name: "t".into(),
            columns: vec![ColumnDef::new("id", DataType::Int).primary_key()],
            rows: vec![vec![Value::Int(1)], vec![Value::Int(1)]],
        };
        let store = MemoryStore::with_tables([snapshot]);
        assert!(StorageEngine::open(Box::new(store)).is_err());
    }
}
