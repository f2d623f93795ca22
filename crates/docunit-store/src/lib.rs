//! docunit store: the document-store boundary and its adapters
//!
//! Provides:
//! - The `DocumentStore` trait the unit-of-work layer writes through
//! - `MemoryStore`, an in-process store with a write journal
//! - `SqliteStore`, JSON documents in SQLite with paged lazy cursors
//! - Embedded, checksummed migrations for the SQLite bookkeeping tables

pub mod db;
pub mod errors;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

// Re-export key types
pub use errors::Result;
pub use memory::{MemoryStore, WriteRecord};
pub use sqlite::SqliteStore;
pub use store::{field_eq, DocumentCursor, DocumentStore, Filter};
