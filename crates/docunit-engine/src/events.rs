//! Save notifications for observers outside the entity
//!
//! Listeners registered on a [`Context`](crate::Context) hear about every
//! insert and update, right before and right after the physical write, next
//! to the entity's own `before_save` / `after_save` hooks. Deletes are not
//! announced.

use docunit_core::ObjectId;
use std::sync::Arc;

/// Which side of the write an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Before,
    After,
}

/// Write the event brackets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub phase: SavePhase,
    pub kind: SaveKind,
    pub entity_id: ObjectId,
    pub entity_type: &'static str,
    pub collection: String,
}

/// Observer called synchronously for each [`SaveEvent`]
pub type SaveListener = Arc<dyn Fn(&SaveEvent) + Send + Sync>;

pub(crate) fn notify(listeners: &[SaveListener], event: &SaveEvent) {
    for listener in listeners {
        listener(event);
    }
}
