//! Dotted-path access and partial-update primitives on JSON documents
//!
//! These implement the update semantics both store adapters share:
//! - `set_path`: absolute assignment, creating intermediate objects and
//!   padding arrays with `null`
//! - `add_to_set`: append unless an equal element is already present
//! - `pull_all`: remove every element equal to the value
//!
//! All three are idempotent, so a partially applied batch can be replayed.

use serde_json::{Map, Value};

use crate::errors::{DocunitError, Result};

fn invalid(path: &str, reason: impl Into<String>) -> DocunitError {
    DocunitError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Split a dotted path into its segments
///
/// # Errors
///
/// `InvalidPath` for an empty path or an empty segment (`a..b`).
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Err(invalid(path, "path is empty").into());
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(path, "empty segment").into());
    }
    Ok(segments)
}

fn parse_index(path: &str, segment: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| invalid(path, format!("'{}' is not an array index", segment)).into())
}

/// Resolve a dotted path, `None` when any segment is missing
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Walk to the slot at `path`, creating what is missing
fn slot_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value> {
    let segments = split_path(path)?;
    let mut current = doc;
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            _ => {
                return Err(invalid(
                    path,
                    format!("cannot descend into scalar at '{}'", segment),
                )
                .into())
            }
        };
    }
    Ok(current)
}

/// Walk to the slot at `path` without creating anything
fn existing_mut<'a>(doc: &'a mut Value, path: &str) -> Result<Option<&'a mut Value>> {
    let segments = split_path(path)?;
    let mut current = doc;
    for segment in segments {
        let next = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                items.get_mut(index)
            }
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Assign `value` at `path`
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    *slot_mut(doc, path)? = value;
    Ok(())
}

/// Append `value` to the array at `path` unless an equal element exists
///
/// A missing field becomes a one-element array. Returns whether the
/// document changed.
pub fn add_to_set(doc: &mut Value, path: &str, value: Value) -> Result<bool> {
    let slot = slot_mut(doc, path)?;
    if slot.is_null() {
        *slot = Value::Array(vec![value]);
        return Ok(true);
    }
    match slot {
        Value::Array(items) => {
            if items.contains(&value) {
                Ok(false)
            } else {
                items.push(value);
                Ok(true)
            }
        }
        _ => Err(invalid(path, "target is not an array").into()),
    }
}

/// Remove every element equal to `value` from the array at `path`
///
/// A missing field is left alone. Returns the number of elements removed.
pub fn pull_all(doc: &mut Value, path: &str, value: &Value) -> Result<usize> {
    match existing_mut(doc, path)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Array(items)) => {
            let before = items.len();
            items.retain(|item| item != value);
            Ok(before - items.len())
        }
        Some(_) => Err(invalid(path, "target is not an array").into()),
    }
}
