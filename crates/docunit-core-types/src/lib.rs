//! Core types shared across docunit facilities
//!
//! This crate provides foundational types used by the error, logging and
//! unit-of-work layers:
//!
//! - **Correlation types**: RequestId (one per save cycle), ContextId (the
//!   back-reference an attached entity holds to its owning context)
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{ContextId, RequestId};
