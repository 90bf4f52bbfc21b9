//! Document ingestion: the extract → chunk → embed → store pipeline, the
//! queue-driven worker loop, and the storage-event dispatcher that feeds
//! the work queue.

pub mod dispatch;
pub mod pipeline;
pub mod worker;

pub use dispatch::{handle_storage_event, DispatchOutcome, StorageEvent};
pub use pipeline::IngestionPipeline;
pub use worker::IngestWorker;
