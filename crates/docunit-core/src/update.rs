//! Translation of differences into partial-update instructions
//!
//! An [`UpdateBatch`] holds, for one entity, the field-sets, collection adds
//! and collection deletes to apply, in that order. Instructions are never
//! coalesced: one record per changed scalar, one instruction per added or
//! removed element.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{Change, Difference};
use crate::document::{add_to_set, get_path, pull_all, set_path};
use crate::errors::{DocunitError, Result};
use crate::tracker::ChangeTracker;

/// Absolute assignment of `value` at a dotted path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    pub path: String,
    pub value: Value,
}

impl FieldSet {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// Assign the value in `doc`
    pub fn apply_to(&self, doc: &mut Value) -> Result<()> {
        set_path(doc, &self.path, self.value.clone())
    }
}

/// Single-element array instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ArrayOp {
    /// Add-to-set: append unless an equal element is present
    Push { path: String, value: Value },
    /// Remove every element equal to `value`
    Pull { path: String, value: Value },
}

impl ArrayOp {
    pub fn path(&self) -> &str {
        match self {
            ArrayOp::Push { path, .. } | ArrayOp::Pull { path, .. } => path,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            ArrayOp::Push { value, .. } | ArrayOp::Pull { value, .. } => value,
        }
    }

    /// Apply the instruction to `doc` with the store's array semantics
    pub fn apply_to(&self, doc: &mut Value) -> Result<()> {
        match self {
            ArrayOp::Push { path, value } => {
                add_to_set(doc, path, value.clone())?;
            }
            ArrayOp::Pull { path, value } => {
                pull_all(doc, path, value)?;
            }
        }
        Ok(())
    }
}

/// One instruction of a batch, in application order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOp<'a> {
    Set(&'a FieldSet),
    Array(&'a ArrayOp),
}

/// Ordered partial-update instructions for one entity
///
/// `adds` only ever holds pushes and `deletes` only pulls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    sets: Vec<FieldSet>,
    adds: Vec<ArrayOp>,
    deletes: Vec<ArrayOp>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: Value) {
        self.sets.push(FieldSet::new(path, value));
    }

    pub fn add(&mut self, path: impl Into<String>, value: Value) {
        self.adds.push(ArrayOp::Push {
            path: path.into(),
            value,
        });
    }

    pub fn delete(&mut self, path: impl Into<String>, value: Value) {
        self.deletes.push(ArrayOp::Pull {
            path: path.into(),
            value,
        });
    }

    pub fn sets(&self) -> &[FieldSet] {
        &self.sets
    }

    pub fn adds(&self) -> &[ArrayOp] {
        &self.adds
    }

    pub fn deletes(&self) -> &[ArrayOp] {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.adds.is_empty() && self.deletes.is_empty()
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.sets.len() + self.adds.len() + self.deletes.len()
    }

    /// Store round-trips needed to apply the batch
    ///
    /// All sets go out in one write; every array instruction is its own.
    pub fn write_count(&self) -> usize {
        usize::from(!self.sets.is_empty()) + self.adds.len() + self.deletes.len()
    }

    /// Instructions in application order: sets, then adds, then deletes
    pub fn ops(&self) -> impl Iterator<Item = UpdateOp<'_>> {
        self.sets
            .iter()
            .map(UpdateOp::Set)
            .chain(self.adds.iter().map(UpdateOp::Array))
            .chain(self.deletes.iter().map(UpdateOp::Array))
    }

    /// Apply every instruction to `doc`, in order
    ///
    /// Produces the document a store holds after applying this batch to
    /// `doc`, array order included.
    pub fn apply_to(&self, doc: &mut Value) -> Result<()> {
        for set in &self.sets {
            set.apply_to(doc)?;
        }
        for op in self.adds.iter().chain(&self.deletes) {
            op.apply_to(doc)?;
        }
        Ok(())
    }
}

/// Translate diff output into an update batch
pub fn translate(differences: &[Difference]) -> UpdateBatch {
    let mut batch = UpdateBatch::new();
    for difference in differences {
        match &difference.change {
            Change::Scalar { new, .. } => batch.set(difference.path.as_str(), new.clone()),
            Change::Collection { added, removed } => {
                for item in added {
                    batch.add(difference.path.as_str(), item.clone());
                }
                for item in removed {
                    batch.delete(difference.path.as_str(), item.clone());
                }
            }
        }
    }
    batch
}

/// Translate recorded dirty flags into an update batch
///
/// Each changed path becomes a field-set of the value found at that path in
/// `current`, the entity's document form.
///
/// # Errors
///
/// `InvalidPath` when a changed path does not resolve in `current`.
pub fn translate_tracked(tracker: &ChangeTracker, current: &Value) -> Result<UpdateBatch> {
    let mut batch = UpdateBatch::new();
    for path in tracker.changed_paths() {
        let value = get_path(current, path).ok_or_else(|| DocunitError::InvalidPath {
            path: path.clone(),
            reason: "changed path not present in document".to_string(),
        })?;
        batch.set(path.as_str(), value.clone());
    }
    for (path, item) in tracker.added() {
        batch.add(path.as_str(), item.clone());
    }
    for (path, item) in tracker.removed() {
        batch.delete(path.as_str(), item.clone());
    }
    Ok(batch)
}
