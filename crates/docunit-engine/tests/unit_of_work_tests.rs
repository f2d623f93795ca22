#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{line, memory_context, person, seed_person, Address, Person};
use docunit_core::{ArrayOp, Entity, EntityState, FieldSet};
use docunit_engine::{Context, ContextConfig, SaveSummary};
use docunit_store::{DocumentStore, MemoryStore, WriteRecord};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_name_and_tags_scenario_issues_set_then_push() {
    let store = MemoryStore::new();
    let stored = person("a", &["x"]);
    seed_person(&store, &stored);
    store.clear_journal().unwrap();

    let mut ctx = Context::open(Arc::new(store.clone()), ContextConfig::default());
    let handle = ctx
        .find_all::<Person>()
        .unwrap()
        .next()
        .expect("one stored person")
        .unwrap();

    let p = ctx.get_mut(&handle).unwrap();
    p.name = "b".to_string();
    p.tags.push("y".to_string());

    let summary = ctx.save().unwrap();
    assert_eq!(
        summary,
        SaveSummary {
            updated: 1,
            writes: 2,
            ..SaveSummary::default()
        }
    );

    let id = stored.id();
    assert_eq!(
        store.journal().unwrap(),
        vec![
            WriteRecord::UpdateFields {
                collection: "person".into(),
                id,
                sets: vec![FieldSet::new("name", json!("b"))],
            },
            WriteRecord::UpdateArray {
                collection: "person".into(),
                id,
                op: ArrayOp::Push {
                    path: "tags".into(),
                    value: json!("y"),
                },
            },
        ]
    );

    let doc = store.get("person", id).unwrap().unwrap();
    assert_eq!(doc["name"], "b");
    assert_eq!(doc["tags"], json!(["x", "y"]));
}

#[test]
fn test_loaded_and_saved_without_changes_writes_nothing() {
    let store = MemoryStore::new();
    seed_person(&store, &person("a", &["x", "y"]));
    store.clear_journal().unwrap();

    let mut ctx = Context::open(Arc::new(store.clone()), ContextConfig::default());
    let handles: Vec<_> = ctx
        .find_all::<Person>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(handles.len(), 1);

    let summary = ctx.save().unwrap();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.writes, 0);
    assert!(store.journal().unwrap().is_empty());
}

#[test]
fn test_create_then_save_inserts_and_becomes_unmodified() {
    let (mut ctx, store) = memory_context();
    let handle = ctx.create::<Person>().unwrap();
    assert_eq!(ctx.state_of(&handle).unwrap(), EntityState::New);
    ctx.get_mut(&handle).unwrap().name = "fresh".into();

    let summary = ctx.save().unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(ctx.state_of(&handle).unwrap(), EntityState::Unmodified);
    assert_eq!(ctx.get(&handle).unwrap().saves, 1);

    let doc = store.get("person", handle.id()).unwrap().unwrap();
    assert_eq!(doc["name"], "fresh");
    assert_eq!(doc["_id"], json!(handle.id().to_hex()));

    // Snapshot was reset: a second save is a no-op
    store.clear_journal().unwrap();
    assert_eq!(ctx.save().unwrap().unchanged, 1);
    assert!(store.journal().unwrap().is_empty());
}

#[test]
fn test_nested_and_per_element_changes_use_dotted_paths() {
    let (mut ctx, store) = memory_context();
    let mut p = person("a", &[]);
    p.address = Some(Address {
        city: "Oslo".into(),
        zip: "0150".into(),
    });
    p.lines = vec![line("apple", 1), line("pear", 2)];
    let handle = ctx.add(p).unwrap();
    ctx.save().unwrap();
    store.clear_journal().unwrap();

    {
        let p = ctx.get_mut(&handle).unwrap();
        if let Some(address) = p.address.as_mut() {
            address.city = "Bergen".into();
        }
        p.lines[1].qty = 5;
    }
    let batch = ctx.pending_changes(&handle).unwrap();
    let paths: Vec<&str> = batch.sets().iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["address.city", "lines.1.qty"]);

    ctx.save().unwrap();
    let doc = store.get("person", handle.id()).unwrap().unwrap();
    assert_eq!(doc["address"]["city"], "Bergen");
    assert_eq!(doc["lines"][1]["qty"], 5);
    assert_eq!(store.journal().unwrap().len(), 1);
}

#[test]
fn test_sets_apply_before_adds_before_deletes() {
    let (mut ctx, store) = memory_context();
    let handle = ctx.add(person("a", &["x"])).unwrap();
    ctx.save().unwrap();
    store.clear_journal().unwrap();

    {
        let p = ctx.get_mut(&handle).unwrap();
        p.tags = vec!["y".into()];
        p.name = "b".into();
    }
    ctx.save().unwrap();

    let kinds: Vec<&str> = store
        .journal()
        .unwrap()
        .iter()
        .map(|w| match w {
            WriteRecord::UpdateFields { .. } => "set",
            WriteRecord::UpdateArray {
                op: ArrayOp::Push { .. },
                ..
            } => "push",
            WriteRecord::UpdateArray {
                op: ArrayOp::Pull { .. },
                ..
            } => "pull",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["set", "push", "pull"]);
}

#[test]
fn test_attachment_order_drives_save_order() {
    let (mut ctx, store) = memory_context();
    let first = ctx.add(person("first", &[])).unwrap();
    let second = ctx.add(person("second", &[])).unwrap();
    let third = ctx.add(person("third", &[])).unwrap();
    ctx.save().unwrap();

    let inserted: Vec<_> = store.journal().unwrap().iter().map(|w| w.id()).collect();
    assert_eq!(inserted, vec![first.id(), second.id(), third.id()]);
    assert_eq!(
        ctx.tracked().iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        inserted
    );
}

#[test]
fn test_detach_returns_a_detached_entity() {
    let (mut ctx, _store) = memory_context();
    let handle = ctx.add(person("a", &[])).unwrap();
    let p = ctx.detach(handle).unwrap();

    assert_eq!(p.state(), EntityState::Detached);
    assert!(p.meta.context().is_none());
    assert!(ctx.is_empty());
    assert!(ctx.get(&handle).is_err());

    // Detached again, so it can be attached anywhere
    let mut other = memory_context().0;
    other.add(p).unwrap();
}

#[test]
fn test_pending_changes_requires_unmodified() {
    let (mut ctx, _store) = memory_context();
    let handle = ctx.add(person("a", &[])).unwrap();
    let err = ctx.pending_changes(&handle).unwrap_err();
    assert_eq!(err.kind(), docunit_core::ExErrorKind::InvalidState);
}

#[test]
fn test_created_at_comes_from_identity() {
    let (mut ctx, _store) = memory_context();
    let handle = ctx.create::<Person>().unwrap();
    let p = ctx.get(&handle).unwrap();
    assert_eq!(p.created_at(), handle.id().timestamp());
}

#[test]
fn test_two_step_query_returns_detached_entities() {
    let store = MemoryStore::new();
    seed_person(&store, &person("a", &[]));
    let mut ctx = Context::open(Arc::new(store.clone()), ContextConfig::default());

    let loaded: Vec<Person> = ctx
        .repository::<Person>()
        .unwrap()
        .find_all()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(loaded[0].state(), EntityState::Detached);
    assert!(ctx.is_empty());

    let p = loaded.into_iter().next().unwrap();
    let handle = ctx.attach(p, EntityState::Unmodified).unwrap();
    assert_eq!(ctx.state_of(&handle).unwrap(), EntityState::Unmodified);
    assert!(store.contains("person", handle.id()).unwrap());
}

fn stored_lines(store: &MemoryStore, id: docunit_core::ObjectId) -> serde_json::Value {
    store.get("person", id).unwrap().unwrap()["lines"].clone()
}

fn saved_with_lines(lines: Vec<common::Line>) -> (Context, MemoryStore, docunit_engine::Handle<Person>) {
    let (mut ctx, store) = memory_context();
    let mut p = person("a", &[]);
    p.lines = lines;
    let handle = ctx.add(p).unwrap();
    ctx.save().unwrap();
    (ctx, store, handle)
}

#[test]
fn test_element_edit_after_append_targets_the_edited_element() {
    let (mut ctx, store, handle) = saved_with_lines(vec![line("A", 1)]);

    ctx.get_mut(&handle).unwrap().lines.push(line("B", 2));
    ctx.save().unwrap();
    ctx.get_mut(&handle).unwrap().lines[1].qty = 20;
    ctx.save().unwrap();

    assert_eq!(
        stored_lines(&store, handle.id()),
        json!([{ "sku": "A", "qty": 1 }, { "sku": "B", "qty": 20 }])
    );
}

#[test]
fn test_element_edit_after_front_insert_targets_the_edited_element() {
    let (mut ctx, store, handle) = saved_with_lines(vec![line("L1", 1)]);

    ctx.get_mut(&handle).unwrap().lines.insert(0, line("L0", 0));
    ctx.save().unwrap();
    // The store appended L0; the entity holds it first
    assert_eq!(
        stored_lines(&store, handle.id()),
        json!([{ "sku": "L1", "qty": 1 }, { "sku": "L0", "qty": 0 }])
    );

    ctx.get_mut(&handle).unwrap().lines[1].qty = 99;
    let batch = ctx.pending_changes(&handle).unwrap();
    assert_eq!(batch.sets(), &[FieldSet::new("lines.0.qty", json!(99))]);
    ctx.save().unwrap();

    assert_eq!(
        stored_lines(&store, handle.id()),
        json!([{ "sku": "L1", "qty": 99 }, { "sku": "L0", "qty": 0 }])
    );
}

#[test]
fn test_element_edit_after_reorder_targets_the_edited_element() {
    let (mut ctx, store, handle) = saved_with_lines(vec![line("A", 1), line("B", 2)]);
    store.clear_journal().unwrap();

    ctx.get_mut(&handle).unwrap().lines.reverse();
    let summary = ctx.save().unwrap();
    assert_eq!(summary.unchanged, 1);
    assert!(store.journal().unwrap().is_empty());

    // Entity order is now [B, A]; the store still holds [A, B]
    ctx.get_mut(&handle).unwrap().lines[1].qty = 50;
    ctx.save().unwrap();

    assert_eq!(
        stored_lines(&store, handle.id()),
        json!([{ "sku": "A", "qty": 50 }, { "sku": "B", "qty": 2 }])
    );
}

#[test]
fn test_element_edits_stay_aligned_across_many_saves() {
    let (mut ctx, store, handle) = saved_with_lines(vec![line("A", 1), line("B", 2)]);

    {
        let p = ctx.get_mut(&handle).unwrap();
        p.lines.insert(0, line("C", 3));
        p.lines.retain(|l| l.sku != "A");
    }
    ctx.save().unwrap();
    ctx.get_mut(&handle).unwrap().lines.reverse();
    ctx.save().unwrap();
    {
        let p = ctx.get_mut(&handle).unwrap();
        for l in p.lines.iter_mut() {
            l.qty *= 10;
        }
    }
    ctx.save().unwrap();

    let mut stored: Vec<common::Line> =
        serde_json::from_value(stored_lines(&store, handle.id())).unwrap();
    stored.sort_by(|a, b| a.sku.cmp(&b.sku));
    assert_eq!(stored, vec![line("B", 20), line("C", 30)]);
}
