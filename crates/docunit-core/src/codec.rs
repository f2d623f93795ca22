//! Conversion between entities, JSON documents and snapshot bytes

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::{Entity, ObjectId};

/// Document field holding the entity identity
pub const ID_FIELD: &str = "_id";

pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ExError::serialization("to_document", e))
}

pub fn from_document<T: DeserializeOwned>(doc: Value) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| ExError::serialization("from_document", e))
}

pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ExError::serialization("to_bytes", e))
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ExError::serialization("from_bytes", e))
}

/// Serialize an entity, generating its identity first so `_id` is present
pub fn entity_document<T: Entity>(entity: &T) -> Result<Value> {
    entity.id();
    to_document(entity)
}

/// Read the identity stored in a document's `_id` field
///
/// # Errors
///
/// `InvalidInput` when `_id` is missing, not a string or not a valid id.
pub fn document_id(doc: &Value) -> Result<ObjectId> {
    let raw = doc.get(ID_FIELD).and_then(Value::as_str).ok_or_else(|| {
        ExError::new(ExErrorKind::InvalidInput)
            .with_op("document_id")
            .with_message("document has no string _id")
    })?;
    raw.parse()
}
