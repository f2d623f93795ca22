//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names identical across every log line and
//! error report emitted by the workspace.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_CONTEXT_ID: &str = "context_id";

// Entity identifiers
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_COLLECTION: &str = "collection";

// Save-cycle counters
pub const FIELD_SETS: &str = "sets";
pub const FIELD_ADDS: &str = "adds";
pub const FIELD_DELETES: &str = "deletes";
pub const FIELD_WRITES: &str = "writes";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
