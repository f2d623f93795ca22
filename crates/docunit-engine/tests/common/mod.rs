#![allow(dead_code)]

use docunit_core::errors::{ExError, ExErrorKind, Result};
use docunit_core::{diffable, ArrayOp, ChangeTracker, Entity, EntityMeta, FieldSet, ObjectId};
use docunit_core::TrackingMode;
use docunit_engine::{Context, ContextConfig};
use docunit_store::{DocumentCursor, DocumentStore, Filter, MemoryStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub zip: String,
}

diffable!(Address { city: value, zip: value });

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub sku: String,
    pub qty: u32,
}

diffable!(Line { identity: sku; sku: value, qty: value });

pub fn line(sku: &str, qty: u32) -> Line {
    Line {
        sku: sku.to_string(),
        qty,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub tags: Vec<String>,
    pub address: Option<Address>,
    pub lines: Vec<Line>,
    #[serde(skip)]
    pub saves: u32,
}

diffable!(Person {
    name: value,
    tags: values,
    address: optional,
    lines: trackables,
});

impl Entity for Person {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn after_save(&mut self) {
        self.saves += 1;
    }
}

pub fn person(name: &str, tags: &[&str]) -> Person {
    Person {
        name: name.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Person::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counter {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub label: String,
    pub value: i64,
    pub marks: Vec<String>,
    #[serde(skip)]
    pub tracker: ChangeTracker,
}

diffable!(Counter {
    label: value,
    value: value,
    marks: values,
});

impl Counter {
    pub fn increment(&mut self) {
        self.value += 1;
        self.tracker.mark_changed("value");
    }

    pub fn mark(&mut self, mark: &str) {
        self.marks.push(mark.to_string());
        self.tracker.record_add("marks", mark).unwrap();
    }
}

impl Entity for Counter {
    fn tracking_mode() -> TrackingMode {
        TrackingMode::ChangeTracker
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn change_tracker(&self) -> Option<&ChangeTracker> {
        Some(&self.tracker)
    }

    fn change_tracker_mut(&mut self) -> Option<&mut ChangeTracker> {
        Some(&mut self.tracker)
    }
}

/// Fresh context over a fresh in-memory store
pub fn memory_context() -> (Context, MemoryStore) {
    let store = MemoryStore::new();
    let context = Context::open(Arc::new(store.clone()), ContextConfig::default());
    (context, store)
}

/// Store a person directly, bypassing any context
pub fn seed_person(store: &MemoryStore, person: &Person) {
    let doc = docunit_core::codec::entity_document(person).unwrap();
    store.insert_one("person", doc).unwrap();
}

/// Memory store that rejects writes for one chosen entity
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    poisoned: Arc<Mutex<Option<ObjectId>>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(&self, id: Option<ObjectId>) {
        *self.poisoned.lock().unwrap() = id;
    }

    fn check(&self, op: &str, id: ObjectId) -> Result<()> {
        if *self.poisoned.lock().unwrap() == Some(id) {
            return Err(ExError::new(ExErrorKind::StoreWrite)
                .with_op(op)
                .with_entity_id(id.to_hex())
                .with_message("injected failure"));
        }
        Ok(())
    }
}

impl DocumentStore for FailingStore {
    fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.check("insert_one", docunit_core::codec::document_id(&document)?)?;
        self.inner.insert_one(collection, document)
    }

    fn update_fields(&self, collection: &str, id: ObjectId, sets: &[FieldSet]) -> Result<()> {
        self.check("update_fields", id)?;
        self.inner.update_fields(collection, id, sets)
    }

    fn update_array(&self, collection: &str, id: ObjectId, op: &ArrayOp) -> Result<()> {
        self.check("update_array", id)?;
        self.inner.update_array(collection, id, op)
    }

    fn delete_one(&self, collection: &str, id: ObjectId) -> Result<()> {
        self.check("delete_one", id)?;
        self.inner.delete_one(collection, id)
    }

    fn find_all(&self, collection: &str) -> Result<DocumentCursor> {
        self.inner.find_all(collection)
    }

    fn find(&self, collection: &str, filter: Filter) -> Result<DocumentCursor> {
        self.inner.find(collection, filter)
    }

    fn contains(&self, collection: &str, id: ObjectId) -> Result<bool> {
        self.inner.contains(collection, id)
    }
}
