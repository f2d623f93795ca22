//! Explicit dirty-flag change tracking
//!
//! Entity types using `TrackingMode::ChangeTracker` embed a `ChangeTracker`
//! (`#[serde(skip)]`) and record each mutation through it instead of being
//! compared against their snapshot at save time.

use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    changed: Vec<String>,
    added: Vec<(String, Value)>,
    removed: Vec<(String, Value)>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the value at `path` changed
    ///
    /// Paths are kept in first-marked order; marking twice is a no-op.
    pub fn mark_changed(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.changed.contains(&path) {
            self.changed.push(path);
        }
    }

    /// Record that `item` entered the collection at `path`
    ///
    /// Cancels a pending removal of the same item.
    pub fn record_add<V: Serialize + ?Sized>(&mut self, path: &str, item: &V) -> Result<()> {
        let item = codec::to_document(item)?;
        if !cancel(&mut self.removed, path, &item) && !contains(&self.added, path, &item) {
            self.added.push((path.to_string(), item));
        }
        Ok(())
    }

    /// Record that `item` left the collection at `path`
    ///
    /// Cancels a pending addition of the same item.
    pub fn record_remove<V: Serialize + ?Sized>(&mut self, path: &str, item: &V) -> Result<()> {
        let item = codec::to_document(item)?;
        if !cancel(&mut self.added, path, &item) && !contains(&self.removed, path, &item) {
            self.removed.push((path.to_string(), item));
        }
        Ok(())
    }

    pub fn changed_paths(&self) -> &[String] {
        &self.changed
    }

    pub fn added(&self) -> &[(String, Value)] {
        &self.added
    }

    pub fn removed(&self) -> &[(String, Value)] {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Forget everything recorded; called after a successful save
    pub fn clear(&mut self) {
        self.changed.clear();
        self.added.clear();
        self.removed.clear();
    }
}

fn contains(entries: &[(String, Value)], path: &str, item: &Value) -> bool {
    entries.iter().any(|(p, v)| p == path && v == item)
}

fn cancel(entries: &mut Vec<(String, Value)>, path: &str, item: &Value) -> bool {
    match entries.iter().position(|(p, v)| p == path && v == item) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}
