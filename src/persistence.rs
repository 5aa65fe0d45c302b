//! Persistence adapters.
//!
//! The storage engine writes through to a [Persistence] implementation after
//! every structural or data change and reads everything back once at startup.
//! Snapshots carry the full column definitions, so a reload enforces the same
//! constraints as the engine that wrote them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::{ColumnDef, Row, Table};

/// Schema and rows of one table, as handed to a [Persistence] adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl TableSnapshot {
    pub fn of(table: &Table) -> Self {
        Self {
            name: table.name.clone(),
            columns: table.schema.columns.clone(),
            rows: table.rows().collect(),
        }
    }
}

/// Durable storage for table schemas and rows. Every call completes
/// synchronously; the engine makes no assumption about durability beyond that.
pub trait Persistence {
    /// Every stored table.
    fn load_all(&self) -> Result<Vec<TableSnapshot>>;

    /// Creates or replaces the stored copy of one table.
    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()>;

    /// Forgets a table. Dropping an unknown table is not an error.
    fn drop_table(&mut self, name: &str) -> Result<()>;
}

/// Keeps snapshots in memory only. Used when no data file is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, TableSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `snapshots`, as if they had been saved earlier.
    pub fn with_tables(snapshots: impl IntoIterator<Item = TableSnapshot>) -> Self {
        Self {
            tables: snapshots
                .into_iter()
                .map(|snapshot| (snapshot.name.clone(), snapshot))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }
}

impl Persistence for MemoryStore {
    fn load_all(&self) -> Result<Vec<TableSnapshot>> {
        Ok(self.tables.values().cloned().collect())
    }

    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()> {
        self.tables.insert(snapshot.name.clone(), snapshot.clone());
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> Result<()> {
        self.tables.remove(name);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    tables: BTreeMap<String, TableSnapshot>,
}

/// Flat-file adapter: the whole database is one JSON document of the form
/// `{ "tables": { "<name>": { "name", "columns", "rows" } } }`, rewritten on
/// every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    document: Document,
}

impl JsonFileStore {
    /// Opens `path`, reading its current contents. A missing or empty file is an
    /// empty database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Document::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.document)?;
        // write-then-rename keeps the previous file intact if the write fails midway
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Persistence for JsonFileStore {
    fn load_all(&self) -> Result<Vec<TableSnapshot>> {
        Ok(self.document.tables.values().cloned().collect())
    }

    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()> {
        self.document
            .tables
            .insert(snapshot.name.clone(), snapshot.clone());
        self.flush()
    }

    fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.document.tables.remove(name).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
