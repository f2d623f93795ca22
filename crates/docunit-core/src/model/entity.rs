use chrono::{DateTime, Utc};
use docunit_core_types::ContextId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::object_id::ObjectId;
use crate::diff::field::{Diffable, IdentityKey};
use crate::errors::{DocunitError, ExError, ExErrorKind, Result};
use crate::tracker::ChangeTracker;

/// Lifecycle state of an entity relative to a unit-of-work context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Not tracked by any context
    #[default]
    Detached,
    /// Tracked; whether it changed is decided at save time by comparison
    Unmodified,
    /// Tracked; will be inserted on the next save
    New,
    /// Tracked; will be deleted on the next save
    Deleted,
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityState::Detached => "Detached",
            EntityState::Unmodified => "Unmodified",
            EntityState::New => "New",
            EntityState::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// How an entity type reports its changes at save time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingMode {
    /// Compare the current value against the snapshot taken at attach/save
    #[default]
    Snapshot,
    /// Read the explicit dirty flags recorded in the entity's `ChangeTracker`
    ChangeTracker,
}

/// Identity, lifecycle state and context back-reference of an entity
///
/// Embed with `#[serde(flatten)]`; only the identity is serialized, as `_id`.
/// Invariant: `state == Detached` exactly when `context` is `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityMeta {
    #[serde(
        rename = "_id",
        default,
        with = "lazy_id",
        skip_serializing_if = "lazy_id::is_unset"
    )]
    id: OnceLock<ObjectId>,
    #[serde(skip)]
    state: EntityState,
    #[serde(skip)]
    context: Option<ContextId>,
}

impl EntityMeta {
    /// Meta for a fresh, detached entity without identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Meta for a detached entity with a known identity
    pub fn with_id(id: ObjectId) -> Self {
        Self {
            id: OnceLock::from(id),
            ..Self::default()
        }
    }

    /// Identity, generated on first access
    pub fn id(&self) -> ObjectId {
        *self.id.get_or_init(ObjectId::new)
    }

    /// Identity if already generated, without generating one
    pub fn peek_id(&self) -> Option<ObjectId> {
        self.id.get().copied()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Owning context, `None` when detached
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Bind to a context with an attached state
    ///
    /// Used by the unit-of-work context; fails if already bound or if
    /// `state` is `Detached`.
    pub fn bind(&mut self, context: ContextId, state: EntityState) -> Result<()> {
        if self.state != EntityState::Detached {
            return Err(DocunitError::AlreadyAttached {
                entity_id: self.id().to_hex(),
                state: self.state.to_string(),
            }
            .into());
        }
        if state == EntityState::Detached {
            return Err(ExError::new(ExErrorKind::InvalidState)
                .with_op("attach")
                .with_entity_id(self.id().to_hex())
                .with_message("cannot attach with state Detached"));
        }
        self.context = Some(context);
        self.state = state;
        Ok(())
    }

    /// Move between attached states
    pub fn transition(&mut self, state: EntityState) -> Result<()> {
        if self.state == EntityState::Detached || state == EntityState::Detached {
            return Err(ExError::new(ExErrorKind::InvalidState)
                .with_op("transition")
                .with_entity_id(self.id().to_hex())
                .with_message(format!("illegal transition {} -> {}", self.state, state)));
        }
        self.state = state;
        Ok(())
    }

    /// Clear context and state
    pub fn unbind(&mut self) {
        self.context = None;
        self.state = EntityState::Detached;
    }
}

impl PartialEq for EntityMeta {
    fn eq(&self, other: &Self) -> bool {
        self.peek_id() == other.peek_id()
    }
}

impl IdentityKey for EntityMeta {
    fn identity_key(&self) -> Option<serde_json::Value> {
        self.peek_id()
            .map(|id| serde_json::Value::String(id.to_hex()))
    }
}

mod lazy_id {
    use super::ObjectId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::sync::OnceLock;

    pub fn is_unset(cell: &OnceLock<ObjectId>) -> bool {
        cell.get().is_none()
    }

    pub fn serialize<S: Serializer>(
        cell: &OnceLock<ObjectId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        cell.get().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OnceLock<ObjectId>, D::Error> {
        Ok(match Option::<ObjectId>::deserialize(deserializer)? {
            Some(id) => OnceLock::from(id),
            None => OnceLock::new(),
        })
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A trackable domain record persisted as one document
///
/// Implementors embed an [`EntityMeta`] and describe their fields through
/// [`Diffable`] (usually via the `diffable!` macro).
pub trait Entity: Diffable + Serialize + DeserializeOwned + Send + 'static {
    /// Type name used for repository routing
    ///
    /// The last path segment of the Rust type name, without generic
    /// arguments: `app::Wrapper<app::Foo>` routes as `Wrapper`.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Change detection strategy for this type
    fn tracking_mode() -> TrackingMode {
        TrackingMode::Snapshot
    }

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Dirty-flag tracker, for types using `TrackingMode::ChangeTracker`
    fn change_tracker(&self) -> Option<&ChangeTracker> {
        None
    }

    fn change_tracker_mut(&mut self) -> Option<&mut ChangeTracker> {
        None
    }

    /// Invoked by the context right before the physical write
    fn before_save(&mut self) {}

    /// Invoked by the context right after the physical write
    fn after_save(&mut self) {}

    /// Identity, generated on first access
    fn id(&self) -> ObjectId {
        self.meta().id()
    }

    fn state(&self) -> EntityState {
        self.meta().state()
    }

    /// Creation time embedded in the identity
    fn created_at(&self) -> DateTime<Utc> {
        self.id().timestamp()
    }

    /// Mark an attached entity for deletion on the next save
    ///
    /// # Errors
    ///
    /// `InvalidState` when the entity is detached; detached entities must be
    /// deleted through the context.
    fn delete(&mut self) -> Result<()> {
        if self.state() == EntityState::Detached {
            return Err(DocunitError::DeleteDetached {
                entity_id: self.id().to_hex(),
            }
            .into());
        }
        self.meta_mut().transition(EntityState::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_id_is_lazy_and_stable() {
        let meta = EntityMeta::new();
        assert!(meta.peek_id().is_none());
        let id = meta.id();
        assert_eq!(meta.peek_id(), Some(id));
        assert_eq!(meta.id(), id);
    }

    #[test]
    fn test_meta_serializes_only_identity() {
        let mut meta = EntityMeta::new();
        assert_eq!(serde_json::to_value(&meta).unwrap(), serde_json::json!({}));

        let id = meta.id();
        meta.bind(ContextId::new(), EntityState::New).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({ "_id": id.to_hex() }));

        let back: EntityMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back.peek_id(), Some(id));
        assert_eq!(back.state(), EntityState::Detached);
        assert!(back.context().is_none());
    }

    #[test]
    fn test_bind_enforces_detached_invariant() {
        let mut meta = EntityMeta::new();
        let ctx = ContextId::new();
        meta.bind(ctx, EntityState::Unmodified).unwrap();
        assert_eq!(meta.context(), Some(ctx));

        let err = meta.bind(ctx, EntityState::New).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::AlreadyAttached);
        assert_eq!(meta.state(), EntityState::Unmodified);

        meta.unbind();
        assert_eq!(meta.state(), EntityState::Detached);
        assert!(meta.context().is_none());
    }

    #[test]
    fn test_bind_rejects_detached_target_state() {
        let mut meta = EntityMeta::new();
        let err = meta.bind(ContextId::new(), EntityState::Detached).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidState);
        assert!(meta.context().is_none());
    }

    #[test]
    fn test_transition_requires_attachment() {
        let mut meta = EntityMeta::new();
        let err = meta.transition(EntityState::Deleted).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidState);
    }

    #[test]
    fn test_short_type_name_drops_path_and_generics() {
        assert_eq!(short_type_name("app::model::Person"), "Person");
        assert_eq!(short_type_name("app::Wrapper<app::Foo>"), "Wrapper");
        assert_eq!(
            short_type_name("Pair<alloc::string::String, app::Foo>"),
            "Pair"
        );
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[derive(Serialize, Deserialize)]
    struct Wrapper<T> {
        #[serde(flatten)]
        meta: EntityMeta,
        inner: T,
    }

    impl<T: Serialize> Diffable for Wrapper<T> {
        fn fields(&self) -> Vec<(&'static str, crate::diff::field::Field<'_>)> {
            vec![("inner", crate::diff::field::Field::Scalar(&self.inner))]
        }
    }

    impl<T: Serialize + DeserializeOwned + Send + 'static> Entity for Wrapper<T> {
        fn meta(&self) -> &EntityMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }
    }

    #[test]
    fn test_generic_entity_routes_by_outer_type_name() {
        assert_eq!(<Wrapper<String> as Entity>::type_name(), "Wrapper");
    }
}
