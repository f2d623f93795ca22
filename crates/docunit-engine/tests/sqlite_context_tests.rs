#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{line, person, Person};
use docunit_core::EntityState;
use docunit_engine::{Context, ContextConfig};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_changes_round_trip_through_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docs.db");
    let config = ContextConfig::from_toml_str(
        r#"
        cursor_batch_size = 2

        [collection_naming]
        mode = "mapped"

        [collection_naming.names]
        Person = "people"
        "#,
    )
    .unwrap();

    let id = {
        let store = Arc::new(config.open_sqlite(&path).unwrap());
        let mut ctx = Context::open(store, config.clone());
        let mut p = person("a", &["x"]);
        p.lines = vec![line("apple", 1), line("pear", 2)];
        let handle = ctx.add(p).unwrap();
        for n in 0..4 {
            ctx.add(person(&format!("filler{}", n), &[])).unwrap();
        }
        ctx.save().unwrap();
        handle.id()
    };

    {
        let store = Arc::new(config.open_sqlite(&path).unwrap());
        let mut ctx = Context::open(store, config.clone());
        let handles: Vec<_> = ctx
            .find_all::<Person>()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(handles.len(), 5);

        let handle = handles.into_iter().find(|h| h.id() == id).unwrap();
        let p = ctx.get_mut(&handle).unwrap();
        p.name = "b".into();
        p.tags.push("y".into());
        p.lines.retain(|l| l.sku != "apple");
        p.lines[0].qty = 9;

        let summary = ctx.save().unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 4);
    }

    let store = Arc::new(config.open_sqlite(&path).unwrap());
    let loaded: Person = Context::open(store, config)
        .repository::<Person>()
        .unwrap()
        .find_all()
        .unwrap()
        .map(|p| p.unwrap())
        .find(|p| p.meta.peek_id() == Some(id))
        .unwrap();

    assert_eq!(loaded.name, "b");
    assert_eq!(loaded.tags, vec!["x", "y"]);
    assert_eq!(loaded.lines, vec![line("pear", 9)]);
    assert_eq!(loaded.meta.state(), EntityState::Detached);
}
