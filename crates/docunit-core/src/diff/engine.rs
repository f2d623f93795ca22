//! Structural diff computation engine.
//!
//! The entry point is [`compute_diff`], which walks two values of the same
//! [`Diffable`] type depth-first in field declaration order and returns a
//! flat, deterministic list of [`Difference`] records.

use serde_json::Value;
use std::collections::HashMap;

use crate::diff::field::{Diffable, Element, Field};
use crate::diff::model::{join_path, Difference};
use crate::errors::{DocunitError, Result};

/// Compute the differences between `original` and `current`
///
/// Rules, per field in declaration order:
/// - nested trackable on both sides: recurse with `parent.field`, emitting
///   nothing for the field itself; present on one side only: scalar record
///   replacing the whole sub-document
/// - collection: one record holding the added and removed elements, matched
///   by identity; trackable elements present on both sides are recursed at
///   `parent.field.<index>`, where `<index>` is the element's position in
///   the original collection (the array the store currently holds)
/// - anything else: scalar record when the document forms differ
///
/// # Errors
///
/// - `Serialization`: a field could not be converted to its document form,
///   or the two values do not expose the same field list
pub fn compute_diff(original: &dyn Diffable, current: &dyn Diffable) -> Result<Vec<Difference>> {
    let mut out = Vec::new();
    diff_into("", original, current, &mut out)?;
    Ok(out)
}

fn schema_mismatch(prefix: &str, reason: String) -> DocunitError {
    DocunitError::SchemaMismatch {
        type_name: if prefix.is_empty() {
            "<root>".to_string()
        } else {
            prefix.to_string()
        },
        reason,
    }
}

fn diff_into(
    prefix: &str,
    original: &dyn Diffable,
    current: &dyn Diffable,
    out: &mut Vec<Difference>,
) -> Result<()> {
    let original_fields = original.fields();
    let current_fields = current.fields();

    if original_fields.len() != current_fields.len() {
        return Err(schema_mismatch(
            prefix,
            format!(
                "original has {} fields, current has {}",
                original_fields.len(),
                current_fields.len()
            ),
        )
        .into());
    }

    for ((original_name, original_field), (current_name, current_field)) in
        original_fields.into_iter().zip(current_fields)
    {
        if original_name != current_name {
            return Err(schema_mismatch(
                prefix,
                format!("field '{}' does not match '{}'", original_name, current_name),
            )
            .into());
        }
        let path = join_path(prefix, original_name);

        match (original_field, current_field) {
            (Field::Scalar(old), Field::Scalar(new)) => {
                let old = old.as_document()?;
                let new = new.as_document()?;
                if old != new {
                    out.push(Difference::scalar(path, old, new));
                }
            }
            (Field::Nested(old), Field::Nested(new)) => match (old, new) {
                (Some(old), Some(new)) => diff_into(&path, old, new, out)?,
                (None, None) => {}
                (old, new) => {
                    let old = match old {
                        Some(v) => v.as_document()?,
                        None => Value::Null,
                    };
                    let new = match new {
                        Some(v) => v.as_document()?,
                        None => Value::Null,
                    };
                    out.push(Difference::scalar(path, old, new));
                }
            },
            (Field::Collection(old), Field::Collection(new)) => {
                diff_collection(&path, old, new, out)?;
            }
            _ => {
                return Err(schema_mismatch(
                    prefix,
                    format!("field '{}' changed kind", original_name),
                )
                .into());
            }
        }
    }

    Ok(())
}

/// A collection element with its resolved identity
struct Keyed<'a> {
    key: String,
    document: Value,
    nested: Option<&'a dyn Diffable>,
}

fn resolve_keys(elements: Vec<Element<'_>>) -> Result<Vec<Keyed<'_>>> {
    elements
        .into_iter()
        .map(|element| match element {
            Element::Scalar(value) => {
                let document = value.as_document()?;
                Ok(Keyed {
                    key: document.to_string(),
                    document,
                    nested: None,
                })
            }
            Element::Trackable(value) => {
                let document = value.as_document()?;
                let key = match value.identity() {
                    Some(identity) => identity.to_string(),
                    None => document.to_string(),
                };
                Ok(Keyed {
                    key,
                    document,
                    nested: Some(value),
                })
            }
        })
        .collect()
}

fn first_positions(elements: &[Keyed<'_>]) -> HashMap<String, usize> {
    let mut positions = HashMap::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        positions.entry(element.key.clone()).or_insert(index);
    }
    positions
}

fn diff_collection(
    path: &str,
    original: Vec<Element<'_>>,
    current: Vec<Element<'_>>,
    out: &mut Vec<Difference>,
) -> Result<()> {
    let original = resolve_keys(original)?;
    let current = resolve_keys(current)?;
    let original_positions = first_positions(&original);
    let current_positions = first_positions(&current);

    // Members on both sides: recurse into trackables, in original order
    for (index, element) in original.iter().enumerate() {
        if original_positions.get(&element.key) != Some(&index) {
            continue;
        }
        let Some(&current_index) = current_positions.get(&element.key) else {
            continue;
        };
        if let (Some(old), Some(new)) = (element.nested, current[current_index].nested) {
            diff_into(&join_path(path, &index.to_string()), old, new, out)?;
        }
    }

    let added: Vec<Value> = current
        .iter()
        .enumerate()
        .filter(|(index, e)| {
            !original_positions.contains_key(&e.key) && current_positions.get(&e.key) == Some(index)
        })
        .map(|(_, e)| e.document.clone())
        .collect();
    let removed: Vec<Value> = original
        .iter()
        .enumerate()
        .filter(|(index, e)| {
            !current_positions.contains_key(&e.key) && original_positions.get(&e.key) == Some(index)
        })
        .map(|(_, e)| e.document.clone())
        .collect();

    if !added.is_empty() || !removed.is_empty() {
        out.push(Difference::collection(path, added, removed));
    }

    Ok(())
}
