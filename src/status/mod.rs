//! Ingestion status propagation: terminal pipeline outcomes travel from
//! the worker to the serving process over the status queue and land in a
//! fast-lookup cache for polling.

pub mod cache;
pub mod consumer;
pub mod event;

pub use cache::StatusCache;
pub use consumer::StatusConsumer;
pub use event::{IngestStatus, StatusEvent};
