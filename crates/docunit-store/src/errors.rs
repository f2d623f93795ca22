//! Error handling for docunit-store
//!
//! Wraps docunit-core ExError with store-specific helpers

use docunit_core::errors::{ExError, ExErrorKind};
use docunit_core::ObjectId;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a write rejection error
pub fn store_write(op: &str, collection: &str, id: ObjectId, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::StoreWrite)
        .with_op(op.to_string())
        .with_collection(collection)
        .with_entity_id(id.to_hex())
        .with_message(reason)
}

/// Create a missing document error
pub fn document_missing(op: &str, collection: &str, id: ObjectId) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_collection(collection)
        .with_entity_id(id.to_hex())
        .with_message("no document with this id")
}

/// Create a lock poisoning error
pub fn poisoned(op: &str) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op(op.to_string())
        .with_message("store lock poisoned by a panicked writer")
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a write rejection from rusqlite::Error, keeping it as the source
pub fn write_rejected(op: &str, collection: &str, id: ObjectId, err: rusqlite::Error) -> ExError {
    store_write(op, collection, id, err.to_string()).with_source(from_rusqlite(err))
}

/// Create a corrupt row error
pub fn corrupt_document(collection: &str, err: serde_json::Error) -> ExError {
    ExError::serialization("sqlite_decode", err).with_collection(collection)
}
