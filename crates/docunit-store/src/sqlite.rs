//! SQLite document store
//!
//! Each document is one row of the `documents` table, keyed by
//! `(collection, id)` and stored as JSON text. Partial updates read the row,
//! apply the instructions with the shared path primitives and write it back
//! inside one transaction. Cursors page through a collection by row sequence,
//! fetching `batch_size` rows at a time.

#![allow(clippy::result_large_err)]

use docunit_core::codec::document_id;
use docunit_core::{ArrayOp, FieldSet, ObjectId};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db;
use crate::errors::{
    corrupt_document, document_missing, from_rusqlite, poisoned, write_rejected, Result,
};
use crate::migrations::apply_migrations;
use crate::store::{apply_array, apply_sets, DocumentCursor, DocumentStore, Filter};

pub const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    batch_size: usize,
}

impl SqliteStore {
    /// Open (or create) a database file and apply pending migrations
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Rows fetched per cursor round-trip; clamped to at least 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| poisoned(op))
    }

    /// Read-modify-write one document in a transaction
    fn modify<F>(&self, op: &str, collection: &str, id: ObjectId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        let mut conn = self.lock(op)?;
        let tx = conn.transaction().map_err(from_rusqlite)?;
        let key = id.to_hex();

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        let body = body.ok_or_else(|| document_missing(op, collection, id))?;

        let mut doc: Value =
            serde_json::from_str(&body).map_err(|e| corrupt_document(collection, e))?;
        apply(&mut doc)?;

        tx.execute(
            "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, key, doc.to_string()],
        )
        .map_err(|e| write_rejected(op, collection, id, e))?;
        tx.commit().map_err(|e| write_rejected(op, collection, id, e))?;

        tracing::debug!(op, collection, entity_id = %key, "document updated");
        Ok(())
    }

    fn cursor(&self, collection: &str, filter: Option<Filter>) -> DocumentCursor {
        Box::new(SqliteCursor {
            conn: Arc::clone(&self.conn),
            collection: collection.to_string(),
            batch_size: self.batch_size,
            last_seq: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            filter,
        })
    }
}

impl DocumentStore for SqliteStore {
    fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        let id = document_id(&document)?;
        let conn = self.lock("insert_one")?;
        conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id.to_hex(), document.to_string()],
        )
        .map_err(|e| write_rejected("insert_one", collection, id, e))?;

        tracing::debug!(collection, entity_id = %id, "document inserted");
        Ok(())
    }

    fn update_fields(&self, collection: &str, id: ObjectId, sets: &[FieldSet]) -> Result<()> {
        self.modify("update_fields", collection, id, |doc| apply_sets(doc, sets))
    }

    fn update_array(&self, collection: &str, id: ObjectId, op: &ArrayOp) -> Result<()> {
        self.modify("update_array", collection, id, |doc| apply_array(doc, op))
    }

    fn delete_one(&self, collection: &str, id: ObjectId) -> Result<()> {
        let conn = self.lock("delete_one")?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id.to_hex()],
        )
        .map_err(|e| write_rejected("delete_one", collection, id, e))?;
        Ok(())
    }

    fn find_all(&self, collection: &str) -> Result<DocumentCursor> {
        Ok(self.cursor(collection, None))
    }

    fn find(&self, collection: &str, filter: Filter) -> Result<DocumentCursor> {
        Ok(self.cursor(collection, Some(filter)))
    }

    fn contains(&self, collection: &str, id: ObjectId) -> Result<bool> {
        let conn = self.lock("contains")?;
        let found = conn
            .query_row(
                "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.to_hex()],
                |_| Ok(()),
            )
            .optional()
            .map_err(from_rusqlite)?;
        Ok(found.is_some())
    }
}

/// Paged cursor over one collection
///
/// Holds no lock between pages; rows inserted while iterating are seen if
/// their sequence is past the last page read.
struct SqliteCursor {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    batch_size: usize,
    last_seq: i64,
    buffer: VecDeque<Value>,
    exhausted: bool,
    filter: Option<Filter>,
}

impl SqliteCursor {
    fn fetch_page(&mut self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| poisoned("cursor_next"))?;
        let mut stmt = conn
            .prepare(
                "SELECT seq, body FROM documents
                 WHERE collection = ?1 AND seq > ?2
                 ORDER BY seq LIMIT ?3",
            )
            .map_err(from_rusqlite)?;
        let limit = i64::try_from(self.batch_size).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![self.collection, self.last_seq, limit], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        if rows.len() < self.batch_size {
            self.exhausted = true;
        }
        for (seq, body) in rows {
            self.last_seq = seq;
            let doc: Value =
                serde_json::from_str(&body).map_err(|e| corrupt_document(&self.collection, e))?;
            if self.filter.as_ref().map_or(true, |f| f(&doc)) {
                self.buffer.push_back(doc);
            }
        }
        Ok(())
    }
}

impl Iterator for SqliteCursor {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                return Some(Ok(doc));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
