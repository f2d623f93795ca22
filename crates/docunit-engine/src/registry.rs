//! Lazily populated cache of repositories, one per entity type
//!
//! Shared between contexts through `Arc`. Construction happens under a
//! single mutex, so concurrent first requests for a type still build exactly
//! one repository.

use docunit_core::errors::{ExError, ExErrorKind, Result};
use docunit_core::Entity;
use docunit_store::DocumentStore;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::CollectionNaming;
use crate::repository::Repository;

type AnyRepository = Arc<dyn Any + Send + Sync>;

pub struct RepositoryRegistry {
    store: Arc<dyn DocumentStore>,
    naming: CollectionNaming,
    repositories: Mutex<HashMap<TypeId, AnyRepository>>,
}

impl RepositoryRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, naming: CollectionNaming) -> Self {
        Self {
            store,
            naming,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// The repository for `T`, built on first request
    ///
    /// # Errors
    ///
    /// `Concurrency` if a thread panicked while holding the registry lock.
    pub fn get_or_create<T: Entity>(&self) -> Result<Arc<Repository<T>>> {
        let mut repositories = self.repositories.lock().map_err(|_| {
            ExError::new(ExErrorKind::Concurrency)
                .with_op("repository_lookup")
                .with_message("repository registry lock poisoned")
        })?;

        let entry = repositories.entry(TypeId::of::<T>()).or_insert_with(|| {
            let collection = self.naming.collection_name(T::type_name());
            tracing::debug!(entity_type = T::type_name(), collection = %collection, "repository created");
            Arc::new(Repository::<T>::new(Arc::clone(&self.store), collection)) as AnyRepository
        });

        Arc::clone(entry).downcast::<Repository<T>>().map_err(|_| {
            ExError::new(ExErrorKind::Internal)
                .with_op("repository_lookup")
                .with_message(format!("registry entry for {} has the wrong type", T::type_name()))
        })
    }

    /// Number of repositories built so far
    pub fn len(&self) -> usize {
        self.repositories.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Naming policy applied to every repository this registry builds
    pub fn naming(&self) -> &CollectionNaming {
        &self.naming
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}
