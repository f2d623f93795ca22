//! Context configuration, loadable from a TOML file
//!
//! ```toml
//! # Rows per SQLite cursor page (default 64)
//! cursor_batch_size = 64
//!
//! # Log every computed difference at debug level (default false)
//! debug = false
//!
//! # Collection names: "lowercase" (default), "exact" or "mapped"
//! [collection_naming]
//! mode = "mapped"
//!
//! [collection_naming.names]
//! Person = "people"
//! ```

use docunit_core::errors::{ExError, ExErrorKind, Result};
use docunit_store::SqliteStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How an entity type name becomes a collection name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CollectionNaming {
    /// `Person` -> `person`
    #[default]
    Lowercase,
    /// `Person` -> `Person`
    Exact,
    /// Explicit names; unmapped types fall back to lowercase
    Mapped {
        #[serde(default)]
        names: BTreeMap<String, String>,
    },
}

impl CollectionNaming {
    pub fn collection_name(&self, type_name: &str) -> String {
        match self {
            CollectionNaming::Lowercase => type_name.to_lowercase(),
            CollectionNaming::Exact => type_name.to_string(),
            CollectionNaming::Mapped { names } => names
                .get(type_name)
                .cloned()
                .unwrap_or_else(|| type_name.to_lowercase()),
        }
    }
}

fn default_cursor_batch_size() -> usize {
    docunit_store::sqlite::DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub collection_naming: CollectionNaming,
    /// Rows fetched per SQLite cursor page
    #[serde(default = "default_cursor_batch_size")]
    pub cursor_batch_size: usize,
    /// Log each computed difference at debug level during save
    #[serde(default)]
    pub debug: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            collection_naming: CollectionNaming::default(),
            cursor_batch_size: default_cursor_batch_size(),
            debug: false,
        }
    }
}

impl ContextConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML or a zero `cursor_batch_size`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ContextConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Config)
                .with_op("config_parse")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("config_load")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cursor_batch_size == 0 {
            return Err(ExError::new(ExErrorKind::Config)
                .with_op("config_validate")
                .with_message("cursor_batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn collection_name(&self, type_name: &str) -> String {
        self.collection_naming.collection_name(type_name)
    }

    /// Open a SQLite store paging with this configuration's batch size
    pub fn open_sqlite<P: AsRef<Path>>(&self, path: P) -> Result<SqliteStore> {
        Ok(SqliteStore::open(path)?.with_batch_size(self.cursor_batch_size))
    }

    pub fn open_sqlite_in_memory(&self) -> Result<SqliteStore> {
        Ok(SqliteStore::open_in_memory()?.with_batch_size(self.cursor_batch_size))
    }
}
