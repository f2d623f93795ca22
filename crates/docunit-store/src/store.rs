//! The document-store boundary
//!
//! Everything the unit-of-work layer needs from a document database:
//! single-document insert and delete, partial updates addressed by
//! identity, lazy cursors, and an existence check.

use docunit_core::document::get_path;
use docunit_core::{ArrayOp, FieldSet, ObjectId};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::Result;

/// Lazy sequence of documents
///
/// Owns whatever it needs to fetch further documents, so it can outlive the
/// call that produced it. Each item is fetched when `next` is called.
pub type DocumentCursor = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// Document-level query predicate
pub type Filter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Filter matching documents whose value at `path` equals `value`
pub fn field_eq(path: impl Into<String>, value: Value) -> Filter {
    let path = path.into();
    Arc::new(move |doc: &Value| get_path(doc, &path) == Some(&value))
}

/// A document database, as seen by repositories
///
/// Update semantics shared by every implementation:
/// - field-sets are absolute assignments at dotted paths
/// - pushes add to set: no-op when an equal element is present
/// - pulls remove every equal element
pub trait DocumentStore: Send + Sync {
    /// Insert a document carrying an `_id`
    ///
    /// # Errors
    ///
    /// `StoreWrite` when a document with the same id exists.
    fn insert_one(&self, collection: &str, document: Value) -> Result<()>;

    /// Apply all `sets` to the document with `id` in one write
    ///
    /// # Errors
    ///
    /// `NotFound` when no document has this id; `InvalidPath` when a path
    /// cannot be written.
    fn update_fields(&self, collection: &str, id: ObjectId, sets: &[FieldSet]) -> Result<()>;

    /// Apply one push or pull to the document with `id`
    fn update_array(&self, collection: &str, id: ObjectId, op: &ArrayOp) -> Result<()>;

    /// Delete the document with `id`; deleting a missing document succeeds
    fn delete_one(&self, collection: &str, id: ObjectId) -> Result<()>;

    /// Every document of the collection, in insertion order
    fn find_all(&self, collection: &str) -> Result<DocumentCursor>;

    /// Documents of the collection accepted by `filter`, in insertion order
    fn find(&self, collection: &str, filter: Filter) -> Result<DocumentCursor>;

    /// Whether a document with `id` exists
    fn contains(&self, collection: &str, id: ObjectId) -> Result<bool>;
}

/// Apply field-sets to a stored document
pub(crate) fn apply_sets(doc: &mut Value, sets: &[FieldSet]) -> Result<()> {
    sets.iter().try_for_each(|set| set.apply_to(doc))
}

/// Apply one array instruction to a stored document
pub(crate) fn apply_array(doc: &mut Value, op: &ArrayOp) -> Result<()> {
    op.apply_to(doc)
}
