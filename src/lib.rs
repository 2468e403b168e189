//! Document content storage over S3.
//!
//! `ContentStore` turns identifier-based content operations (store, fetch,
//! ranged reads, streaming, checksums, pre-signed uploads) into object
//! operations on an `ObjectBackend`. `S3Backend` talks to Amazon S3 or any
//! compatible service; `MemoryBackend` keeps objects in process.

pub mod backend;
pub mod checksum;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use backend::{ChunkStream, MemoryBackend, ObjectBackend, S3Backend, StreamedObject};
pub use errors::{ContentError, ContentResult};
pub use services::ContentStore;
pub use state::AppState;
