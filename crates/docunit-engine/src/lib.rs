//! docunit engine: repositories and the unit-of-work context
//!
//! Provides:
//! - `Repository<T>`, the per-entity-type gateway to a `DocumentStore`
//! - `RepositoryRegistry`, a lazily filled, shareable repository cache
//! - `Context`, which attaches entities and turns their changes into
//!   partial updates on `save`
//! - `ContextConfig`, loadable from TOML
//! - `SaveEvent` listeners notified around each insert and update
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging (`log_op_start!`, `log_op_end!`,
//! `log_op_error!`) for attach, delete and save. Lower layers only emit
//! `tracing::debug!`.

pub mod config;
pub mod context;
pub mod events;
pub mod registry;
pub mod repository;

pub use config::{CollectionNaming, ContextConfig};
pub use context::{Attaching, Context, Handle, SaveSummary};
pub use events::{SaveEvent, SaveKind, SaveListener, SavePhase};
pub use registry::RepositoryRegistry;
pub use repository::{EntityCursor, Repository};
