//! In-process document store
//!
//! Documents live in insertion order per collection behind one mutex.
//! Every accepted write is appended to a journal so callers can observe
//! exactly which instructions reached the store.

use docunit_core::codec::document_id;
use docunit_core::{ArrayOp, FieldSet, ObjectId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{document_missing, poisoned, store_write, Result};
use crate::store::{apply_array, apply_sets, DocumentCursor, DocumentStore, Filter};

/// One accepted write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Insert {
        collection: String,
        id: ObjectId,
    },
    UpdateFields {
        collection: String,
        id: ObjectId,
        sets: Vec<FieldSet>,
    },
    UpdateArray {
        collection: String,
        id: ObjectId,
        op: ArrayOp,
    },
    Delete {
        collection: String,
        id: ObjectId,
    },
}

impl WriteRecord {
    pub fn id(&self) -> ObjectId {
        match self {
            WriteRecord::Insert { id, .. }
            | WriteRecord::UpdateFields { id, .. }
            | WriteRecord::UpdateArray { id, .. }
            | WriteRecord::Delete { id, .. } => *id,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<(ObjectId, Value)>>,
    journal: Vec<WriteRecord>,
}

impl MemoryState {
    fn document_mut(&mut self, collection: &str, id: ObjectId) -> Option<&mut Value> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|(doc_id, _)| *doc_id == id)
            .map(|(_, doc)| doc)
    }
}

/// Cheaply cloneable handle to a shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| poisoned(op))
    }

    /// Writes accepted so far, oldest first
    pub fn journal(&self) -> Result<Vec<WriteRecord>> {
        Ok(self.lock("journal")?.journal.clone())
    }

    pub fn clear_journal(&self) -> Result<()> {
        self.lock("clear_journal")?.journal.clear();
        Ok(())
    }

    /// Current document with `id`, if any
    pub fn get(&self, collection: &str, id: ObjectId) -> Result<Option<Value>> {
        let state = self.lock("get")?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    /// Number of documents in the collection
    pub fn count(&self, collection: &str) -> Result<usize> {
        let state = self.lock("count")?;
        Ok(state.collections.get(collection).map_or(0, Vec::len))
    }

    fn cursor(&self, collection: &str, filter: Option<Filter>) -> DocumentCursor {
        Box::new(MemoryCursor {
            state: Arc::clone(&self.state),
            collection: collection.to_string(),
            position: 0,
            filter,
            done: false,
        })
    }
}

impl DocumentStore for MemoryStore {
    fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        let id = document_id(&document)?;
        let mut state = self.lock("insert_one")?;
        let docs = state.collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|(doc_id, _)| *doc_id == id) {
            return Err(store_write(
                "insert_one",
                collection,
                id,
                "duplicate key",
            ));
        }
        docs.push((id, document));
        state.journal.push(WriteRecord::Insert {
            collection: collection.to_string(),
            id,
        });
        Ok(())
    }

    fn update_fields(&self, collection: &str, id: ObjectId, sets: &[FieldSet]) -> Result<()> {
        let mut state = self.lock("update_fields")?;
        let doc = state
            .document_mut(collection, id)
            .ok_or_else(|| document_missing("update_fields", collection, id))?;
        // Apply to a copy so a failing path leaves the document untouched
        let mut updated = doc.clone();
        apply_sets(&mut updated, sets)?;
        *doc = updated;
        state.journal.push(WriteRecord::UpdateFields {
            collection: collection.to_string(),
            id,
            sets: sets.to_vec(),
        });
        Ok(())
    }

    fn update_array(&self, collection: &str, id: ObjectId, op: &ArrayOp) -> Result<()> {
        let mut state = self.lock("update_array")?;
        let doc = state
            .document_mut(collection, id)
            .ok_or_else(|| document_missing("update_array", collection, id))?;
        let mut updated = doc.clone();
        apply_array(&mut updated, op)?;
        *doc = updated;
        state.journal.push(WriteRecord::UpdateArray {
            collection: collection.to_string(),
            id,
            op: op.clone(),
        });
        Ok(())
    }

    fn delete_one(&self, collection: &str, id: ObjectId) -> Result<()> {
        let mut state = self.lock("delete_one")?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.retain(|(doc_id, _)| *doc_id != id);
        }
        state.journal.push(WriteRecord::Delete {
            collection: collection.to_string(),
            id,
        });
        Ok(())
    }

    fn find_all(&self, collection: &str) -> Result<DocumentCursor> {
        Ok(self.cursor(collection, None))
    }

    fn find(&self, collection: &str, filter: Filter) -> Result<DocumentCursor> {
        Ok(self.cursor(collection, Some(filter)))
    }

    fn contains(&self, collection: &str, id: ObjectId) -> Result<bool> {
        Ok(self.get(collection, id)?.is_some())
    }
}

/// Cursor reading one document per `next` under the store lock
///
/// Positions are indices into the collection, so documents deleted behind
/// the cursor shift later ones one step back.
struct MemoryCursor {
    state: Arc<Mutex<MemoryState>>,
    collection: String,
    position: usize,
    filter: Option<Filter>,
    done: bool,
}

impl Iterator for MemoryCursor {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                self.done = true;
                return Some(Err(poisoned("cursor_next")));
            }
        };
        let docs = state.collections.get(&self.collection)?;
        while let Some((_, doc)) = docs.get(self.position) {
            self.position += 1;
            if self.filter.as_ref().map_or(true, |f| f(doc)) {
                return Some(Ok(doc.clone()));
            }
        }
        self.done = true;
        None
    }
}
