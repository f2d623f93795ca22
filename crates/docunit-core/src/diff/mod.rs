//! Structural diffing of trackable object graphs
//!
//! - `field`: the `Diffable` capability and the `diffable!` macro
//! - `model`: difference records
//! - `engine`: `compute_diff`

pub mod engine;
pub mod field;
pub mod model;

pub use engine::compute_diff;
pub use field::{AsDocument, Diffable, Element, Field, IdentityKey};
pub use model::{Change, Difference};
