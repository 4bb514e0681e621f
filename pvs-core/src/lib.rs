//! Preview pipeline, content-addressed store, and request coordinator.
//!
//! This crate is the domain layer: it never touches HTTP directly (that
//! lives in `pvs-server`) and never installs a logging subscriber of its
//! own -- it only emits `tracing` events for whatever the binary
//! installs.

pub mod backends;
pub mod coordinator;
pub mod error;
pub mod icons;
pub mod janitor;
pub mod metrics;
pub mod pathref;
pub mod plugin;
pub mod registry;
pub mod request;
pub mod source;
pub mod store;
pub mod worker_pool;

pub use error::{MediaError, Result};
pub use pathref::PathRef;
pub use request::{OutputFormat, PageRange, PreviewRequest, StoreFlag};
