use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;
use crate::persistence::{JsonFileStore, Persistence};

pub const DEFAULT_LOG_FILTER: &str = "minisql=info";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// JSON file holding every table. `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_data_file(path: impl Into<PathBuf>) -> Self {
        Self {
            data_file: Some(path.into()),
            ..Self::default()
        }
    }

    /// The persistence adapter this configuration selects, if any.
    pub fn persistence(&self) -> Result<Option<Box<dyn Persistence>>> {
        match &self.data_file {
            Some(path) => Ok(Some(Box::new(JsonFileStore::open(path)?))),
            None => Ok(None),
        }
    }
}
