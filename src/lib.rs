pub mod ast;
pub mod column;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod executor;
pub mod index;
pub mod parser;
pub mod persistence;
pub mod storage;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use config::EngineConfig;
pub use data_type::DataType;
pub use database::Database;
pub use error::{DbError, ErrorReport, Result};
pub use executor::{ExecResult, QueryResult};
pub use persistence::{JsonFileStore, MemoryStore, Persistence, TableSnapshot};
pub use storage::StorageEngine;
pub use table::{ColumnDef, Constraints, Schema, Table};
pub use value::Value;
