//! docunit core: change tracking and diff-to-update translation
//!
//! This crate holds everything that does not touch a store:
//! - Error and logging facilities
//! - The entity model (`Entity`, `EntityMeta`, `ObjectId`)
//! - The `Diffable` capability and the structural diff engine
//! - Snapshots and explicit change trackers
//! - Translation of differences into ordered partial-update batches
//! - Dotted-path update primitives shared by store adapters

pub mod codec;
pub mod diff;
pub mod document;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod snapshot;
pub mod tracker;
pub mod update;

pub use docunit_core_types::schema;

// Re-export commonly used types
pub use diff::{compute_diff, Change, Diffable, Difference};
pub use errors::{DocunitError, ExError, ExErrorKind, Result};
pub use model::{Entity, EntityMeta, EntityState, ObjectId, TrackingMode};
pub use snapshot::Snapshot;
pub use tracker::ChangeTracker;
pub use update::{translate, translate_tracked, ArrayOp, FieldSet, UpdateBatch, UpdateOp};
