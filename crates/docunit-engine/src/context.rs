//! Unit-of-work context
//!
//! A `Context` owns every entity attached to it, together with the snapshot
//! taken at attach or last save. Callers reach attached entities through
//! typed [`Handle`]s. `save()` walks the attachment table in attachment
//! order and, per entity:
//!
//! - `New`: insert, then `Unmodified` with a fresh snapshot
//! - `Unmodified`: diff against the snapshot (or read the change tracker),
//!   apply field-sets, then pushes, then pulls; no write when nothing changed
//! - `Deleted`: delete, then drop from the table
//!
//! After an update the snapshot is advanced by the written batch rather than
//! re-captured from the entity, so it keeps the store's collection order.
//!
//! The first failure aborts the save. Entities already written keep their
//! new state; the failing entity and everything after it are untouched, so
//! calling `save()` again resumes where it stopped.
//!
//! ## Lazy queries
//!
//! `find_all` and `find` return an [`Attaching`] iterator: each document is
//! fetched and attached as `Unmodified` when the iterator reaches it.
//! Documents whose identity is already tracked yield the existing handle.
//! For detached results use `repository::<T>()?.find_all()` and attach
//! explicitly.

use docunit_core::codec::entity_document;
use docunit_core::errors::{DocunitError, ExError, ExErrorKind, Result};
use docunit_core::{
    compute_diff, log_op_end, log_op_error, log_op_start, translate, translate_tracked, Entity,
    EntityState, ObjectId, Snapshot, TrackingMode, UpdateBatch,
};
use docunit_core_types::{ContextId, RequestId};
use docunit_store::{DocumentStore, Filter};
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ContextConfig;
use crate::events::{notify, SaveEvent, SaveKind, SaveListener, SavePhase};
use crate::registry::RepositoryRegistry;
use crate::repository::{EntityCursor, Repository};

/// Typed reference to an entity attached to a context
pub struct Handle<T> {
    id: ObjectId,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(id: ObjectId) -> Self {
        Self {
            id,
            _entity: PhantomData,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}

/// Counts from one successful `save()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Store round-trips issued
    pub writes: usize,
}

enum SaveOutcome {
    Inserted,
    Updated { writes: usize },
    Unchanged,
    Deleted,
}

/// Type-erased attachment table entry
trait TrackedEntry: Send {
    fn state(&self) -> EntityState;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn save(&mut self, scope: &SaveScope<'_>) -> Result<SaveOutcome>;
}

/// What one save cycle hands to each entry
struct SaveScope<'a> {
    registry: &'a RepositoryRegistry,
    debug: bool,
    listeners: &'a [SaveListener],
}

struct Attached<T> {
    entity: T,
    snapshot: Snapshot<T>,
}

fn save_failed(op: &str, id: ObjectId, collection: &str, source: ExError) -> ExError {
    ExError::new(source.kind())
        .with_op(op)
        .with_entity_id(id.to_hex())
        .with_collection(collection)
        .with_message(format!("{} failed", op))
        .with_source(source)
}

impl<T: Entity> Attached<T> {
    /// Batch that would bring the stored document up to date
    fn pending(&mut self, debug: bool) -> Result<UpdateBatch> {
        match T::tracking_mode() {
            TrackingMode::Snapshot => {
                if self.snapshot.matches(&self.entity)? {
                    return Ok(UpdateBatch::new());
                }
                let original = self.snapshot.original()?;
                let differences = compute_diff(original, &self.entity)?;
                if debug {
                    let id = self.entity.id();
                    for difference in &differences {
                        tracing::debug!(
                            entity_id = %id,
                            path = %difference.path,
                            change = ?difference.change,
                            "difference"
                        );
                    }
                }
                Ok(translate(&differences))
            }
            TrackingMode::ChangeTracker => {
                let current = entity_document(&self.entity)?;
                let tracker = self.entity.change_tracker().ok_or_else(|| {
                    ExError::new(ExErrorKind::Internal)
                        .with_op("pending_changes")
                        .with_entity_id(self.entity.id().to_hex())
                        .with_message(format!(
                            "{} uses change tracking but exposes no tracker",
                            T::type_name()
                        ))
                })?;
                translate_tracked(tracker, &current)
            }
        }
    }

    /// Capture the inserted document as the new baseline
    fn mark_inserted(&mut self) -> Result<()> {
        self.snapshot.reset(&self.entity)?;
        self.clear_tracker();
        Ok(())
    }

    /// Advance the baseline by the batch just written
    ///
    /// The baseline tracks the stored document, not the entity: collection
    /// indices in the next diff must address the elements the store holds.
    fn mark_updated(&mut self, batch: &UpdateBatch) -> Result<()> {
        self.snapshot.apply(batch)?;
        self.clear_tracker();
        Ok(())
    }

    fn announce(
        &self,
        phase: SavePhase,
        kind: SaveKind,
        collection: &str,
        scope: &SaveScope<'_>,
    ) {
        if scope.listeners.is_empty() {
            return;
        }
        let event = SaveEvent {
            phase,
            kind,
            entity_id: self.entity.id(),
            entity_type: T::type_name(),
            collection: collection.to_string(),
        };
        notify(scope.listeners, &event);
    }

    fn clear_tracker(&mut self) {
        if let Some(tracker) = self.entity.change_tracker_mut() {
            tracker.clear();
        }
    }
}

impl<T: Entity> TrackedEntry for Attached<T> {
    fn state(&self) -> EntityState {
        self.entity.state()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn save(&mut self, scope: &SaveScope<'_>) -> Result<SaveOutcome> {
        let repository = scope.registry.get_or_create::<T>()?;
        let collection = repository.collection();
        let id = self.entity.id();

        match self.entity.state() {
            EntityState::New => {
                self.announce(SavePhase::Before, SaveKind::Insert, collection, scope);
                self.entity.before_save();
                repository
                    .insert(&self.entity)
                    .map_err(|e| save_failed("save.insert", id, collection, e))?;
                self.entity.meta_mut().transition(EntityState::Unmodified)?;
                self.mark_inserted()?;
                self.announce(SavePhase::After, SaveKind::Insert, collection, scope);
                self.entity.after_save();
                Ok(SaveOutcome::Inserted)
            }
            EntityState::Unmodified => {
                self.announce(SavePhase::Before, SaveKind::Update, collection, scope);
                self.entity.before_save();
                let batch = self
                    .pending(scope.debug)
                    .map_err(|e| save_failed("save.update", id, collection, e))?;
                let writes = repository
                    .apply(id, &batch)
                    .map_err(|e| save_failed("save.update", id, collection, e))?;
                self.mark_updated(&batch)?;
                self.announce(SavePhase::After, SaveKind::Update, collection, scope);
                self.entity.after_save();
                if batch.is_empty() {
                    Ok(SaveOutcome::Unchanged)
                } else {
                    Ok(SaveOutcome::Updated { writes })
                }
            }
            EntityState::Deleted => {
                repository
                    .delete(id)
                    .map_err(|e| save_failed("save.delete", id, collection, e))?;
                Ok(SaveOutcome::Deleted)
            }
            EntityState::Detached => Err(ExError::new(ExErrorKind::Internal)
                .with_op("save")
                .with_entity_id(id.to_hex())
                .with_message("detached entity found in the attachment table")),
        }
    }
}

/// Unit of work over one document store
///
/// Not shareable across threads: every operation that changes the
/// attachment table takes `&mut self`.
pub struct Context {
    id: ContextId,
    registry: Arc<RepositoryRegistry>,
    config: ContextConfig,
    listeners: Vec<SaveListener>,
    order: Vec<ObjectId>,
    entries: HashMap<ObjectId, Box<dyn TrackedEntry>>,
}

impl Context {
    /// Context over a shared registry with default settings
    ///
    /// Collection naming is taken from the registry.
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        let config = ContextConfig {
            collection_naming: registry.naming().clone(),
            ..ContextConfig::default()
        };
        Self::from_parts(registry, config)
    }

    /// Context over a shared registry
    ///
    /// # Errors
    ///
    /// `Config` when `config.collection_naming` differs from the registry's:
    /// repositories are named by the registry that builds them.
    pub fn with_config(registry: Arc<RepositoryRegistry>, config: ContextConfig) -> Result<Self> {
        if &config.collection_naming != registry.naming() {
            return Err(ExError::new(ExErrorKind::Config)
                .with_op("context_open")
                .with_message(format!(
                    "collection naming {:?} does not match the shared registry's {:?}",
                    config.collection_naming,
                    registry.naming()
                )));
        }
        Ok(Self::from_parts(registry, config))
    }

    /// Context with a private registry built from `config`
    pub fn open(store: Arc<dyn DocumentStore>, config: ContextConfig) -> Self {
        let registry = Arc::new(RepositoryRegistry::new(
            store,
            config.collection_naming.clone(),
        ));
        Self::from_parts(registry, config)
    }

    fn from_parts(registry: Arc<RepositoryRegistry>, config: ContextConfig) -> Self {
        Self {
            id: ContextId::new(),
            registry,
            config,
            listeners: Vec::new(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Register an observer for insert and update events of every save
    pub fn on_save<F>(&mut self, listener: F)
    where
        F: Fn(&SaveEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Number of attached entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The cached repository for `T`
    pub fn repository<T: Entity>(&self) -> Result<Arc<Repository<T>>> {
        self.registry.get_or_create::<T>()
    }

    /// Start tracking `entity` with `state`
    ///
    /// # Errors
    ///
    /// - `AlreadyAttached`: the entity is not `Detached`, or another instance
    ///   with the same identity is already tracked
    /// - `InvalidState`: `state` is `Detached`, or `Deleted` for an entity the
    ///   store does not contain
    pub fn attach<T: Entity>(&mut self, entity: T, state: EntityState) -> Result<Handle<T>> {
        let entity_id = entity.id();
        log_op_start!(
            "attach",
            context_id = %self.id,
            entity_id = %entity_id,
            entity_type = T::type_name(),
            state = %state
        );
        let start = Instant::now();

        let handle = self.attach_impl(entity, state).map_err(|e| {
            log_op_error!(
                "attach",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                context_id = %self.id,
                entity_id = %entity_id
            );
            e
        })?;

        log_op_end!(
            "attach",
            duration_ms = start.elapsed().as_millis() as u64,
            context_id = %self.id,
            entity_id = %entity_id
        );
        Ok(handle)
    }

    fn attach_impl<T: Entity>(&mut self, mut entity: T, state: EntityState) -> Result<Handle<T>> {
        let id = entity.id();

        if entity.state() != EntityState::Detached {
            let err = if entity.meta().context() == Some(self.id) {
                DocunitError::AlreadyAttached {
                    entity_id: id.to_hex(),
                    state: entity.state().to_string(),
                }
            } else {
                DocunitError::ForeignContext {
                    entity_id: id.to_hex(),
                }
            };
            return Err(err.into());
        }
        if self.entries.contains_key(&id) {
            return Err(DocunitError::IdentityAlreadyTracked {
                entity_id: id.to_hex(),
            }
            .into());
        }

        let repository = self.repository::<T>()?;
        if state == EntityState::Deleted && !repository.exists(id)? {
            return Err(DocunitError::DeleteNotPersisted {
                entity_id: id.to_hex(),
            }
            .into());
        }

        let snapshot = Snapshot::capture(&entity)?;
        entity.meta_mut().bind(self.id, state)?;

        self.entries
            .insert(id, Box::new(Attached { entity, snapshot }));
        self.order.push(id);
        Ok(Handle::new(id))
    }

    /// Attach `T::default()` as `New`
    pub fn create<T: Entity + Default>(&mut self) -> Result<Handle<T>> {
        self.repository::<T>()?;
        self.attach(T::default(), EntityState::New)
    }

    /// Attach a pre-built entity as `New`
    pub fn add<T: Entity>(&mut self, entity: T) -> Result<Handle<T>> {
        self.attach(entity, EntityState::New)
    }

    /// Schedule an entity for deletion on the next save
    ///
    /// A detached entity is attached as `Deleted`, which requires the store
    /// to contain it. A copy of an entity attached to this context marks the
    /// tracked instance instead.
    pub fn delete<T: Entity>(&mut self, entity: T) -> Result<Handle<T>> {
        let id = entity.id();
        log_op_start!("delete", context_id = %self.id, entity_id = %id);
        let start = Instant::now();

        let result = if entity.state() != EntityState::Detached
            && entity.meta().context() == Some(self.id)
        {
            let handle = Handle::new(id);
            self.delete_attached(&handle).map(|_| handle)
        } else {
            self.attach_impl(entity, EntityState::Deleted)
        };

        match result {
            Ok(handle) => {
                log_op_end!(
                    "delete",
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id,
                    entity_id = %id
                );
                Ok(handle)
            }
            Err(e) => {
                log_op_error!(
                    "delete",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id,
                    entity_id = %id
                );
                Err(e)
            }
        }
    }

    /// Mark an attached entity `Deleted`
    pub fn delete_attached<T: Entity>(&mut self, handle: &Handle<T>) -> Result<()> {
        self.get_mut(handle)?.delete()
    }

    fn attached<T: Entity>(&self, handle: &Handle<T>) -> Result<&Attached<T>> {
        self.entries
            .get(&handle.id)
            .and_then(|entry| entry.as_any().downcast_ref::<Attached<T>>())
            .ok_or_else(|| not_attached(handle.id))
    }

    fn attached_mut<T: Entity>(&mut self, handle: &Handle<T>) -> Result<&mut Attached<T>> {
        self.entries
            .get_mut(&handle.id)
            .and_then(|entry| entry.as_any_mut().downcast_mut::<Attached<T>>())
            .ok_or_else(|| not_attached(handle.id))
    }

    /// The attached entity behind `handle`
    ///
    /// # Errors
    ///
    /// `NotAttached` once the entity was detached or deleted by a save.
    pub fn get<T: Entity>(&self, handle: &Handle<T>) -> Result<&T> {
        Ok(&self.attached(handle)?.entity)
    }

    pub fn get_mut<T: Entity>(&mut self, handle: &Handle<T>) -> Result<&mut T> {
        Ok(&mut self.attached_mut(handle)?.entity)
    }

    pub fn state_of<T: Entity>(&self, handle: &Handle<T>) -> Result<EntityState> {
        Ok(self.attached(handle)?.entity.state())
    }

    /// The update batch `save()` would apply for this entity, without writing
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the entity is `Unmodified`.
    pub fn pending_changes<T: Entity>(&mut self, handle: &Handle<T>) -> Result<UpdateBatch> {
        let debug = self.config.debug;
        let attached = self.attached_mut(handle)?;
        let state = attached.entity.state();
        if state != EntityState::Unmodified {
            return Err(ExError::new(ExErrorKind::InvalidState)
                .with_op("pending_changes")
                .with_entity_id(handle.id.to_hex())
                .with_message(format!("entity is {}, not Unmodified", state)));
        }
        attached.pending(debug)
    }

    /// Stop tracking an entity and hand it back `Detached`
    pub fn detach<T: Entity>(&mut self, handle: Handle<T>) -> Result<T> {
        // Check the type before removing anything
        self.attached(&handle)?;
        let entry = self
            .entries
            .remove(&handle.id)
            .ok_or_else(|| not_attached(handle.id))?;
        self.order.retain(|id| *id != handle.id);

        let attached = entry
            .into_any()
            .downcast::<Attached<T>>()
            .map_err(|_| not_attached(handle.id))?;
        let mut entity = attached.entity;
        entity.meta_mut().unbind();
        Ok(entity)
    }

    /// Attach every stored `T` lazily, as `Unmodified`
    pub fn find_all<T: Entity>(&mut self) -> Result<Attaching<'_, T>> {
        let cursor = self.repository::<T>()?.find_all()?;
        Ok(Attaching {
            context: self,
            cursor,
        })
    }

    /// Attach every stored `T` whose document matches `filter`, lazily
    pub fn find<T: Entity>(&mut self, filter: Filter) -> Result<Attaching<'_, T>> {
        let cursor = self.repository::<T>()?.find(filter)?;
        Ok(Attaching {
            context: self,
            cursor,
        })
    }

    /// Persist every attached entity in attachment order
    ///
    /// # Errors
    ///
    /// The first failing entity's error, carrying its id, the failed
    /// operation (`save.insert`, `save.update`, `save.delete`) and the
    /// store's error as source.
    pub fn save(&mut self) -> Result<SaveSummary> {
        let request_id = RequestId::new();
        log_op_start!(
            "save",
            context_id = %self.id,
            request_id = %request_id,
            entities = self.order.len()
        );
        let start = Instant::now();

        match self.save_impl() {
            Ok(summary) => {
                log_op_end!(
                    "save",
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id,
                    request_id = %request_id,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    deleted = summary.deleted,
                    writes = summary.writes
                );
                Ok(summary)
            }
            Err(e) => {
                let e = e.with_request_id(request_id.clone());
                log_op_error!(
                    "save",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id,
                    request_id = %request_id,
                    entity_id = e.entity_id().unwrap_or_default()
                );
                Err(e)
            }
        }
    }

    fn save_impl(&mut self) -> Result<SaveSummary> {
        let mut summary = SaveSummary::default();
        let ids = self.order.clone();
        let scope = SaveScope {
            registry: &self.registry,
            debug: self.config.debug,
            listeners: &self.listeners,
        };

        for id in ids {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            match entry.save(&scope)? {
                SaveOutcome::Inserted => {
                    summary.inserted += 1;
                    summary.writes += 1;
                }
                SaveOutcome::Updated { writes } => {
                    summary.updated += 1;
                    summary.writes += writes;
                }
                SaveOutcome::Unchanged => summary.unchanged += 1,
                SaveOutcome::Deleted => {
                    summary.deleted += 1;
                    summary.writes += 1;
                    self.entries.remove(&id);
                    self.order.retain(|o| *o != id);
                }
            }
        }

        Ok(summary)
    }

    /// Ids of attached entities in attachment order, with their states
    pub fn tracked(&self) -> Vec<(ObjectId, EntityState)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (*id, e.state())))
            .collect()
    }
}

fn not_attached(id: ObjectId) -> ExError {
    DocunitError::NotAttached {
        entity_id: id.to_hex(),
    }
    .into()
}

/// Lazy query result that attaches each entity as it is reached
///
/// Dropping the iterator early leaves the remaining documents unattached.
pub struct Attaching<'c, T> {
    context: &'c mut Context,
    cursor: EntityCursor<T>,
}

impl<T: Entity> Iterator for Attaching<'_, T> {
    type Item = Result<Handle<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entity = match self.cursor.next()? {
            Ok(entity) => entity,
            Err(e) => return Some(Err(e)),
        };
        let id = entity.id();
        if self.context.entries.contains_key(&id) {
            return Some(Ok(Handle::new(id)));
        }
        Some(self.context.attach(entity, EntityState::Unmodified))
    }
}
