#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Counter, Person};
use docunit_core::ExErrorKind;
use docunit_engine::{CollectionNaming, Context, ContextConfig, RepositoryRegistry};
use docunit_store::MemoryStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_first_requests_build_one_repository() {
    let registry = Arc::new(RepositoryRegistry::new(
        Arc::new(MemoryStore::new()),
        CollectionNaming::Lowercase,
    ));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create::<Person>().unwrap()
            })
        })
        .collect();
    let repositories: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(repositories
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_contexts_share_a_registry() {
    let registry = Arc::new(RepositoryRegistry::new(
        Arc::new(MemoryStore::new()),
        CollectionNaming::Lowercase,
    ));
    let first = Context::new(Arc::clone(&registry));
    let second = Context::new(Arc::clone(&registry));

    let a = first.repository::<Person>().unwrap();
    let b = second.repository::<Person>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_repositories_are_per_type_and_named_by_policy() {
    let mut names = BTreeMap::new();
    names.insert("Person".to_string(), "people".to_string());
    let registry = RepositoryRegistry::new(
        Arc::new(MemoryStore::new()),
        CollectionNaming::Mapped { names },
    );

    assert!(registry.is_empty());
    assert_eq!(registry.get_or_create::<Person>().unwrap().collection(), "people");
    assert_eq!(registry.get_or_create::<Counter>().unwrap().collection(), "counter");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_context_config_must_agree_with_registry_naming() {
    let registry = Arc::new(RepositoryRegistry::new(
        Arc::new(MemoryStore::new()),
        CollectionNaming::Exact,
    ));

    let err = Context::with_config(Arc::clone(&registry), ContextConfig::default())
        .err()
        .expect("naming mismatch is rejected");
    assert_eq!(err.kind(), ExErrorKind::Config);

    let config = ContextConfig {
        collection_naming: CollectionNaming::Exact,
        debug: true,
        ..ContextConfig::default()
    };
    let ctx = Context::with_config(Arc::clone(&registry), config).unwrap();
    assert!(ctx.config().debug);
    assert_eq!(ctx.repository::<Person>().unwrap().collection(), "Person");
}

#[test]
fn test_new_context_reports_the_registry_naming() {
    let registry = Arc::new(RepositoryRegistry::new(
        Arc::new(MemoryStore::new()),
        CollectionNaming::Exact,
    ));
    let ctx = Context::new(Arc::clone(&registry));
    assert_eq!(ctx.config().collection_naming, CollectionNaming::Exact);
    assert_eq!(ctx.config().collection_name("Person"), "Person");
}
