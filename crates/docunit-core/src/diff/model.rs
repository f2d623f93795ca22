//! Difference records produced by the diff engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One path-scoped change between a snapshot and the current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// Dotted path from the entity root; collection indices are decimal
    pub path: String,
    pub change: Change,
}

/// What changed at a path
///
/// A record is either a scalar replacement or a collection membership
/// change, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Value replaced; becomes a field-set of `new`
    Scalar { old: Value, new: Value },
    /// Elements entered or left the collection; becomes pushes and pulls
    Collection { added: Vec<Value>, removed: Vec<Value> },
}

impl Difference {
    pub fn scalar(path: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            path: path.into(),
            change: Change::Scalar { old, new },
        }
    }

    pub fn collection(path: impl Into<String>, added: Vec<Value>, removed: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            change: Change::Collection { added, removed },
        }
    }

    /// True if this record describes collection membership
    pub fn is_collection(&self) -> bool {
        matches!(self.change, Change::Collection { .. })
    }
}

/// Join a parent path and a segment with `.`
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}
