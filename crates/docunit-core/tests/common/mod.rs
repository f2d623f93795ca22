use docunit_core::{diffable, ChangeTracker, Entity, EntityMeta, TrackingMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub zip: String,
}

diffable!(Address { city: value, zip: value });

/// Order line identified by its SKU inside collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub sku: String,
    pub qty: u32,
}

diffable!(Line { identity: sku; sku: value, qty: value });

#[allow(dead_code)]
pub fn line(sku: &str, qty: u32) -> Line {
    Line {
        sku: sku.to_string(),
        qty,
    }
}

/// Snapshot-tracked entity exercising every field kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub tags: Vec<String>,
    pub address: Option<Address>,
    pub lines: Vec<Line>,
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
}

#[allow(dead_code)]
pub fn person(name: &str, tags: &[&str]) -> Person {
    Person {
        name: name.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Person::default()
    }
}

/// Entity reporting its changes through explicit dirty flags
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

#[allow(dead_code)]
impl Counter {
    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
        self.tracker.mark_changed("label");
    }

    pub fn increment(&mut self) {
        self.value += 1;
        self.tracker.mark_changed("value");
    }

    pub fn mark(&mut self, mark: &str) {
        if !self.marks.iter().any(|m| m == mark) {
            self.marks.push(mark.to_string());
            self.tracker
                .record_add("marks", mark)
                .expect("string serializes");
        }
    }

    pub fn unmark(&mut self, mark: &str) {
        if let Some(pos) = self.marks.iter().position(|m| m == mark) {
            self.marks.remove(pos);
            self.tracker
                .record_remove("marks", mark)
                .expect("string serializes");
        }
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
