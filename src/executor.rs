//! Runs parsed statements against a [StorageEngine].
//!
//! Mutating statements go straight to the engine. `SELECT` is evaluated here:
//! the source rows (one table, or the nested-loop pairing of two tables under
//! a JOIN) are filtered by WHERE, sorted by ORDER BY, truncated by LIMIT and
//! finally projected.

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{
    ColumnRef, ComparisonOp, CreateTable, Delete, InsertInto, Join, Select, SelectItem,
    SortDirection, Statement, Update,
};
use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::storage::{StorageEngine, compare};
use crate::table::{Row, Table};
use crate::value::Value;

/// The result of a successful `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// What a statement hands back to its caller. Serializes to one of
/// `{ columns, rows }`, `{ affected }` or `{ status: "ok" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExecResult {
    Rows(QueryResult),
    Affected { affected: usize },
    Status { status: &'static str },
}

impl ExecResult {
    pub fn ok() -> Self {
        Self::Status { status: "ok" }
    }

    pub fn affected(&self) -> Option<usize> {
        match self {
            Self::Affected { affected } => Some(*affected),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<QueryResult> {
        match self {
            Self::Rows(result) => Some(result),
            _ => None,
        }
    }
}

pub struct Executor<'e> {
    engine: &'e mut StorageEngine,
}

impl<'e> Executor<'e> {
    pub fn new(engine: &'e mut StorageEngine) -> Self {
        Self { engine }
    }

    pub fn execute(&mut self, statement: Statement) -> Result<ExecResult> {
        tracing::debug!(statement = statement.name(), "executing");
        match statement {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::DropTable(drop) => {
                self.engine.drop_table(&drop.name)?;
                Ok(ExecResult::ok())
            }
            Statement::InsertInto(insert) => self.insert(insert),
            Statement::Select(select) => execute_select(self.engine, &select).map(ExecResult::Rows),
            Statement::Update(Update {
                table,
                assignments,
                where_clause,
            }) => {
                let affected = self
                    .engine
                    .update(&table, where_clause.as_ref(), &assignments)?;
                Ok(ExecResult::Affected { affected })
            }
            Statement::Delete(Delete {
                table,
                where_clause,
            }) => {
                let affected = self.engine.delete(&table, where_clause.as_ref())?;
                Ok(ExecResult::Affected { affected })
            }
        }
    }

    fn create_table(&mut self, create: CreateTable) -> Result<ExecResult> {
        if create.if_not_exists && self.engine.has_table(&create.name) {
            tracing::debug!(table = %create.name, "table exists, skipping create");
            return Ok(ExecResult::ok());
        }
        self.engine.create_table(create.name, create.columns)?;
        Ok(ExecResult::ok())
    }

    /// Maps the provided values onto the schema. With a column list, columns
    /// left out receive NULL.
    fn insert(&mut self, insert: InsertInto) -> Result<ExecResult> {
        let table = self
            .engine
            .get_table(&insert.table)
            .ok_or_else(|| DbError::TableNotFound(insert.table.clone()))?;

        let row = match insert.columns {
            None => insert.values,
            Some(columns) => {
                if columns.len() != insert.values.len() {
                    return Err(DbError::ValueCountMismatch {
                        expected: columns.len(),
                        found: insert.values.len(),
                    });
                }
                let mut provided: HashMap<usize, Value> = HashMap::with_capacity(columns.len());
                for (name, value) in columns.into_iter().zip(insert.values) {
                    let col_idx = table
                        .column_index(&name)
                        .ok_or_else(|| DbError::ColumnNotFound(name.clone()))?;
                    if provided.insert(col_idx, value).is_some() {
                        return Err(DbError::InvalidQuery(format!(
                            "column {name:?} is listed more than once"
                        )));
                    }
                }
                (0..table.schema.columns.len())
                    .map(|col_idx| provided.remove(&col_idx).unwrap_or(Value::Null))
                    .collect()
            }
        };

        let affected = self.engine.insert(&insert.table, row)?;
        Ok(ExecResult::Affected { affected })
    }
}

/// One column of the rows a SELECT reads from.
struct SourceColumn<'a> {
    table: &'a str,
    name: &'a str,
    data_type: DataType,
}

/// The column space of a FROM clause: one table, or two under a JOIN.
struct Sources<'a> {
    columns: Vec<SourceColumn<'a>>,
    joined: bool,
}

impl<'a> Sources<'a> {
    fn new(tables: &[&'a Table]) -> Self {
        let columns = tables
            .iter()
            .flat_map(|table| {
                table.schema.columns.iter().map(|def| SourceColumn {
                    table: table.name.as_str(),
                    name: def.name.as_str(),
                    data_type: def.data_type,
                })
            })
            .collect();
        Self {
            columns,
            joined: tables.len() > 1,
        }
    }

    /// Position of `column` in a source row.
    ///
    /// An unqualified name shared by both sides of a join is ambiguous.
    fn resolve(&self, column: &ColumnRef) -> Result<usize> {
        let mut hits = self.columns.iter().enumerate().filter(|(_, source)| {
            source.name == column.column
                && column.table.as_deref().is_none_or(|table| table == source.table)
        });
        match (hits.next(), hits.next()) {
            (Some((idx, _)), None) => Ok(idx),
            (Some(_), Some(_)) => Err(DbError::AmbiguousColumn(column.to_string())),
            (None, _) => Err(DbError::ColumnNotFound(column.to_string())),
        }
    }

    fn output_name(&self, idx: usize) -> String {
        let source = &self.columns[idx];
        if self.joined {
            format!("{}.{}", source.table, source.name)
        } else {
            source.name.to_string()
        }
    }
}

enum Projection {
    Columns(Vec<(String, usize)>),
    Count(Vec<String>),
}

/// Evaluates a `SELECT` without mutating anything.
pub fn execute_select(engine: &StorageEngine, select: &Select) -> Result<QueryResult> {
    let base = engine
        .get_table(&select.table)
        .ok_or_else(|| DbError::TableNotFound(select.table.clone()))?;

    let (sources, mut rows) = match &select.join {
        None => {
            let rows: Vec<Row> = engine
                .select(&select.table, select.where_clause.as_ref())?
                .collect();
            (Sources::new(&[base]), rows)
        }
        Some(join) => {
            let other = engine
                .get_table(&join.table)
                .ok_or_else(|| DbError::TableNotFound(join.table.clone()))?;
            if other.name == base.name {
                return Err(DbError::InvalidQuery(format!(
                    "table {:?} cannot be joined with itself",
                    base.name
                )));
            }
            let sources = Sources::new(&[base, other]);
            let mut rows = nested_loop_join(&sources, base, other, join)?;
            if let Some(expr) = &select.where_clause {
                let predicate = expr
                    .conjuncts()
                    .into_iter()
                    .map(|(column, op, value)| bind(&sources, column, op, value))
                    .collect::<Result<Vec<_>>>()?;
                rows.retain(|row| {
                    predicate
                        .iter()
                        .all(|(idx, op, value)| compare(&row[*idx], *op, value))
                });
            }
            (sources, rows)
        }
    };

    let projection = project(&sources, &select.items)?;

    if let Some(order_by) = &select.order_by {
        let key = sort_key(&sources, &projection, &select.items, &order_by.column)?;
        if let Some(idx) = key {
            // stable: ties keep insertion order
            rows.sort_by(|a, b| match order_by.direction {
                SortDirection::Asc => a[idx].cmp(&b[idx]),
                SortDirection::Desc => b[idx].cmp(&a[idx]),
            });
        }
    }

    let mut result = match projection {
        Projection::Count(columns) => {
            let count = Value::Int(rows.len() as i64);
            let row = vec![count; columns.len()];
            QueryResult {
                columns,
                rows: vec![row],
            }
        }
        Projection::Columns(columns) => {
            let rows = rows
                .into_iter()
                .map(|row| columns.iter().map(|(_, idx)| row[*idx].clone()).collect())
                .collect();
            QueryResult {
                columns: columns.into_iter().map(|(name, _)| name).collect(),
                rows,
            }
        }
    };

    if let Some(limit) = select.limit {
        result.rows.truncate(limit);
    }
    tracing::debug!(table = %select.table, rows = result.rows.len(), "select");
    Ok(result)
}

/// Pairs every row of `left` with every row of `right` whose ON columns hold
/// the same non-NULL value, in left-then-right insertion order.
fn nested_loop_join(
    sources: &Sources<'_>,
    left: &Table,
    right: &Table,
    join: &Join,
) -> Result<Vec<Row>> {
    let a = sources.resolve(&join.left)?;
    let b = sources.resolve(&join.right)?;
    if sources.columns[a].table == sources.columns[b].table {
        return Err(DbError::InvalidQuery(format!(
            "ON clause must compare a column of {:?} with a column of {:?}",
            left.name, right.name
        )));
    }

    let right_rows: Vec<Row> = right.rows().collect();
    let mut out = Vec::new();
    for left_row in left.rows() {
        for right_row in &right_rows {
            let mut row = left_row.clone();
            row.extend(right_row.iter().cloned());
            if !row[a].is_null() && row[a] == row[b] {
                out.push(row);
            }
        }
    }
    Ok(out)
}

fn bind(
    sources: &Sources<'_>,
    column: &ColumnRef,
    op: ComparisonOp,
    value: &Value,
) -> Result<(usize, ComparisonOp, Value)> {
    let idx = sources.resolve(column)?;
    let data_type = sources.columns[idx].data_type;
    if !data_type.is_compatible(value) {
        return Err(DbError::TypeMismatch {
            column: column.to_string(),
            expected: data_type.to_string(),
            found: value.type_name().to_string(),
        });
    }
    Ok((idx, op, value.clone()))
}

fn project(sources: &Sources<'_>, items: &[SelectItem]) -> Result<Projection> {
    let counts = items
        .iter()
        .filter(|item| matches!(item, SelectItem::CountStar { .. }))
        .count();
    if counts > 0 {
        if counts != items.len() {
            return Err(DbError::InvalidQuery(
                "COUNT(*) cannot be combined with plain columns".into(),
            ));
        }
        let names = items
            .iter()
            .map(|item| match item {
                SelectItem::CountStar { alias: Some(alias) } => alias.clone(),
                _ => "count".to_string(),
            })
            .collect();
        return Ok(Projection::Count(names));
    }

    let mut columns = Vec::new();
    for item in items {
        match item {
            SelectItem::Star => {
                columns.extend((0..sources.columns.len()).map(|idx| (sources.output_name(idx), idx)));
            }
            SelectItem::Column { column, alias } => {
                let idx = sources.resolve(column)?;
                let name = alias.clone().unwrap_or_else(|| column.to_string());
                columns.push((name, idx));
            }
            SelectItem::CountStar { .. } => {}
        }
    }
    Ok(Projection::Columns(columns))
}

/// The source column ORDER BY sorts on. An unqualified name matching a
/// projection alias wins over a source column; `None` means the ORDER BY
/// names a COUNT(*) output and there is nothing to sort.
fn sort_key(
    sources: &Sources<'_>,
    projection: &Projection,
    items: &[SelectItem],
    column: &ColumnRef,
) -> Result<Option<usize>> {
    if column.table.is_none() {
        match projection {
            Projection::Count(names) if names.iter().any(|n| *n == column.column) => {
                return Ok(None);
            }
            Projection::Columns(_) => {
                let aliased = items.iter().find_map(|item| match item {
                    SelectItem::Column {
                        column: source,
                        alias: Some(alias),
                    } if *alias == column.column => Some(source),
                    _ => None,
                });
                if let Some(source) = aliased {
                    return sources.resolve(source).map(Some);
                }
            }
            _ => {}
        }
    }
    sources.resolve(column).map(Some)
}
