//! Entity model: identity, lifecycle state and the `Entity` trait

pub mod entity;
pub mod object_id;

pub use entity::{Entity, EntityMeta, EntityState, TrackingMode};
pub use object_id::ObjectId;
