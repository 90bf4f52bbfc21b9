//! PDF question-answering backend: an ingestion pipeline that turns
//! uploaded PDFs into an embedded vector index, and a retrieval-augmented
//! query engine served over HTTP.

pub mod aws;
pub mod chunk;
pub mod config;
pub mod embedder;
pub mod errors;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod object_store;
pub mod queue;
pub mod rag;
pub mod server;
pub mod state;
pub mod status;
pub mod vector_store;
