//! Object storage backends.
//!
//! `ObjectBackend` is the seam between the content store and a concrete
//! object service. Implementations work on fully-qualified keys; prefixing
//! happens above this layer.

pub mod memory;
pub mod s3;

use crate::{
    errors::ContentResult,
    models::{BlobMetadata, RangedBytes, StoredObject},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use mockall::automock;
use std::time::Duration;
use url::Url;

pub use memory::MemoryBackend;
pub use s3::S3Backend;

/// A lazy, finite sequence of content chunks. Concatenated, the chunks
/// reproduce the object exactly. An `Err` item is always the last one.
pub type ChunkStream = BoxStream<'static, ContentResult<Bytes>>;

/// Chunk size used when streaming objects out of a backend.
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// An opened object: the metadata of the response that carries the chunks.
pub struct StreamedObject {
    pub metadata: BlobMetadata,
    pub chunks: ChunkStream,
}

/// Trait defining object storage operations
#[automock]
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Write `object` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, object: StoredObject) -> ContentResult<()>;

    /// Read the whole object.
    async fn get_object(&self, key: &str) -> ContentResult<Bytes>;

    /// Read the inclusive byte range `start..=end`.
    async fn get_object_range(&self, key: &str, start: u64, end: u64)
    -> ContentResult<RangedBytes>;

    /// Open the object as a chunk stream.
    async fn get_object_stream(&self, key: &str) -> ContentResult<StreamedObject>;

    /// Head query. Absent objects produce `ContentError::NotFound`.
    async fn head_object(&self, key: &str) -> ContentResult<BlobMetadata>;

    /// Delete the object. Deleting an absent key succeeds.
    async fn delete_object(&self, key: &str) -> ContentResult<()>;

    /// Issue a URL authorizing one PUT to `key` for `ttl`.
    async fn presign_put(&self, key: &str, ttl: Duration) -> ContentResult<Url>;

    /// Confirm the target container exists and accepts our credentials.
    async fn check_bucket(&self) -> ContentResult<()>;
}
