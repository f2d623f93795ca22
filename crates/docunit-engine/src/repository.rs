//! Per-entity-type gateway to the document store
//!
//! A repository owns no tracking state: it serializes, routes to its
//! collection and issues writes exactly as asked.

use docunit_core::codec::{entity_document, from_document};
use docunit_core::errors::Result;
use docunit_core::{Entity, ObjectId, UpdateBatch};
use docunit_store::{DocumentCursor, DocumentStore, Filter};
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Insert the entity's full document
    pub fn insert(&self, entity: &T) -> Result<()> {
        let document = entity_document(entity)?;
        self.store.insert_one(&self.collection, document)
    }

    /// Apply a batch: all sets in one write, then each push, then each pull
    ///
    /// Returns the number of writes issued; an empty batch issues none.
    pub fn apply(&self, id: ObjectId, batch: &UpdateBatch) -> Result<usize> {
        let mut writes = 0;
        if !batch.sets().is_empty() {
            self.store
                .update_fields(&self.collection, id, batch.sets())?;
            writes += 1;
        }
        for op in batch.adds().iter().chain(batch.deletes()) {
            self.store.update_array(&self.collection, id, op)?;
            writes += 1;
        }

        tracing::debug!(
            collection = %self.collection,
            entity_id = %id,
            sets = batch.sets().len(),
            adds = batch.adds().len(),
            deletes = batch.deletes().len(),
            "update batch applied"
        );
        Ok(writes)
    }

    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.store.delete_one(&self.collection, id)
    }

    pub fn exists(&self, id: ObjectId) -> Result<bool> {
        self.store.contains(&self.collection, id)
    }

    /// Every stored entity, deserialized lazily and detached
    pub fn find_all(&self) -> Result<EntityCursor<T>> {
        Ok(EntityCursor::new(self.store.find_all(&self.collection)?))
    }

    /// Stored entities whose document matches `filter`, detached
    pub fn find(&self, filter: Filter) -> Result<EntityCursor<T>> {
        Ok(EntityCursor::new(self.store.find(&self.collection, filter)?))
    }
}

/// Lazy sequence of detached entities
pub struct EntityCursor<T> {
    documents: DocumentCursor,
    _entity: PhantomData<fn() -> T>,
}

impl<T> EntityCursor<T> {
    fn new(documents: DocumentCursor) -> Self {
        Self {
            documents,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Iterator for EntityCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.documents.next()?;
        Some(document.and_then(from_document))
    }
}
