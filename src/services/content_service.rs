//! ContentStore: identifier-based document content operations over an
//! `ObjectBackend`.
//!
//! Every call derives the object key from the configured prefix and the
//! caller's identifier, forwards to the backend once, and reports what the
//! backend said. Nothing is cached and nothing is retried here.

use crate::{
    backend::{ChunkStream, ObjectBackend, S3Backend, StreamedObject},
    checksum::parse_algorithm,
    config::StoreSettings,
    errors::{ContentError, ContentResult},
    models::{BlobMetadata, KeyPrefix, ObjectKey, PresignedUploadGrant, StoredObject},
};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut};
use std::{future::Future, io, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

/// Largest buffer reserved up front from a caller-declared stream length.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// ContentStore is a stateless façade: clones share the backend handle and
/// may run any number of operations concurrently.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn ObjectBackend>,
    prefix: KeyPrefix,
    call_timeout: Option<Duration>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, prefix: KeyPrefix) -> Self {
        Self {
            backend,
            prefix,
            call_timeout: None,
        }
    }

    /// Bound every backend call by `timeout`. Elapsing yields `BackendUnavailable`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Build an S3-backed store from settings.
    pub async fn from_settings(settings: &StoreSettings) -> ContentResult<Self> {
        let backend = S3Backend::new(settings).await?;
        let mut store = Self::new(Arc::new(backend), KeyPrefix::new(&settings.path_prefix));
        store.call_timeout = settings.operation_timeout;
        Ok(store)
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    /// Key under which `id` is stored.
    pub fn object_key(&self, id: &str) -> ObjectKey {
        self.prefix.key_for(id)
    }

    async fn bounded<T, F>(&self, fut: F) -> ContentResult<T>
    where
        F: Future<Output = ContentResult<T>>,
    {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                ContentError::BackendUnavailable(format!(
                    "operation timed out after {:?}",
                    limit
                ))
            })?,
            None => fut.await,
        }
    }

    /// Store `data` for `id` and return the key it is retrievable under.
    pub async fn store(&self, id: &str, data: Bytes, mime_type: &str) -> ContentResult<ObjectKey> {
        let key = self.object_key(id);
        let size = data.len();
        self.bounded(
            self.backend
                .put_object(key.as_str(), StoredObject::new(data, mime_type)),
        )
        .await
        .inspect_err(|err| error!("Failed to store content for document {}: {}", id, err))?;

        debug!(
            "Stored content for document {} ({} bytes) at path {}",
            id, size, key
        );
        Ok(key)
    }

    /// Drain `stream` completely, then store the concatenated chunks.
    ///
    /// Chunk order is preserved. A failing chunk aborts the call before any
    /// backend write. `known_length` only sizes the buffer; a mismatch with
    /// the drained length is logged and the drained bytes win.
    pub async fn store_stream<S>(
        &self,
        id: &str,
        stream: S,
        mime_type: &str,
        known_length: Option<u64>,
    ) -> ContentResult<ObjectKey>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let key = self.object_key(id);
        let result = self
            .bounded(async {
                let capacity = known_length.unwrap_or(0).min(MAX_PREALLOCATION) as usize;
                let mut buffer = BytesMut::with_capacity(capacity);

                pin_mut!(stream);
                while let Some(chunk_res) = stream.next().await {
                    let chunk = chunk_res.map_err(ContentError::StreamRead)?;
                    buffer.extend_from_slice(&chunk);
                }

                if let Some(declared) = known_length {
                    if declared != buffer.len() as u64 {
                        warn!(
                            "declared length {} for document {} differs from streamed length {}",
                            declared,
                            id,
                            buffer.len()
                        );
                    }
                }

                let size = buffer.len();
                self.backend
                    .put_object(key.as_str(), StoredObject::new(buffer.freeze(), mime_type))
                    .await?;
                Ok::<_, ContentError>(size)
            })
            .await;

        match result {
            Ok(size) => {
                debug!(
                    "Stored streamed content for document {} ({} bytes) at path {}",
                    id, size, key
                );
                Ok(key)
            }
            Err(err) => {
                error!("Failed to store streamed content for document {}: {}", id, err);
                Err(err)
            }
        }
    }

    /// Full content of `id`.
    pub async fn get(&self, id: &str) -> ContentResult<Bytes> {
        let key = self.object_key(id);
        let data = self
            .bounded(self.backend.get_object(key.as_str()))
            .await
            .inspect_err(|err| error!("Failed to retrieve content for document {}: {}", id, err))?;
        debug!("Retrieved content for document {} ({} bytes)", id, data.len());
        Ok(data)
    }

    /// Bytes `start..=end` of `id`.
    pub async fn get_range(&self, id: &str, start: u64, end: u64) -> ContentResult<Bytes> {
        let key = self.object_key(id);
        let invalid = || ContentError::InvalidRange {
            key: key.to_string(),
            start,
            end,
        };
        if start > end {
            return Err(invalid());
        }

        let ranged = self
            .bounded(self.backend.get_object_range(key.as_str(), start, end))
            .await
            .inspect_err(|err| {
                error!("Failed to retrieve content range for document {}: {}", id, err)
            })?;

        let expected = (end - start).saturating_add(1);
        let out_of_bounds = match ranged.object_length {
            Some(length) => end >= length,
            None => (ranged.data.len() as u64) < expected,
        };
        if out_of_bounds {
            return Err(invalid());
        }

        debug!(
            "Retrieved content range for document {} ({}-{}, {} bytes)",
            id,
            start,
            end,
            ranged.data.len()
        );
        Ok(ranged.data)
    }

    /// Content of `id` as a chunk stream.
    ///
    /// Only opening the stream is bounded by the call timeout; chunks are
    /// pulled at the consumer's pace.
    pub async fn get_stream(&self, id: &str) -> ContentResult<ChunkStream> {
        Ok(self.get_stream_with_metadata(id).await?.chunks)
    }

    /// Content of `id` as a chunk stream, with the metadata of the same read.
    pub async fn get_stream_with_metadata(&self, id: &str) -> ContentResult<StreamedObject> {
        let key = self.object_key(id);
        self.open_stream(key.as_str()).await
    }

    /// Whether an object exists for `id`.
    ///
    /// Only a not-found answer maps to `false`. Any other failure, including
    /// access denied, is returned as an error.
    pub async fn exists(&self, id: &str) -> ContentResult<bool> {
        let key = self.object_key(id);
        match self.bounded(self.backend.head_object(key.as_str())).await {
            Ok(_) => Ok(true),
            Err(ContentError::NotFound(_)) => Ok(false),
            Err(err) => {
                error!("Error checking content existence for document {}: {}", id, err);
                Err(err)
            }
        }
    }

    /// Head metadata of `id`, fetched fresh on each call.
    pub async fn metadata(&self, id: &str) -> ContentResult<BlobMetadata> {
        let key = self.object_key(id);
        self.bounded(self.backend.head_object(key.as_str()))
            .await
            .inspect_err(|err| error!("Failed to read metadata for document {}: {}", id, err))
    }

    /// Content length of `id` in bytes.
    pub async fn size(&self, id: &str) -> ContentResult<u64> {
        let size = self.metadata(id).await?.content_length;
        debug!("Retrieved content size for document {}: {} bytes", id, size);
        Ok(size)
    }

    /// Delete the content of `id`. Absent content is not an error.
    pub async fn delete(&self, id: &str) -> ContentResult<()> {
        let key = self.object_key(id);
        self.remove(key.as_str()).await?;
        debug!("Deleted content for document {}", id);
        Ok(())
    }

    /// Lowercase hex digest of the full content of `id`.
    ///
    /// The object is fetched whole and hashed in memory.
    pub async fn checksum(&self, id: &str, algorithm: &str) -> ContentResult<String> {
        let algorithm = parse_algorithm(algorithm)?;
        let data = self.get(id).await?;
        let digest = algorithm.hex_digest(&data);
        debug!(
            "Calculated {} checksum for document {}: {}",
            algorithm, id, digest
        );
        Ok(digest)
    }

    /// Compare the digest of `id` with `expected`, ignoring case.
    pub async fn verify_checksum(
        &self,
        id: &str,
        expected: &str,
        algorithm: &str,
    ) -> ContentResult<bool> {
        let actual = self.checksum(id, algorithm).await?;
        let matches = actual.eq_ignore_ascii_case(expected.trim());
        debug!("Checksum verification for document {}: {}", id, matches);
        Ok(matches)
    }

    /// Issue a URL that lets an external uploader PUT the content of `id`.
    pub async fn presign_upload(&self, id: &str, ttl: Duration) -> ContentResult<PresignedUploadGrant> {
        if ttl.is_zero() {
            return Err(ContentError::InvalidArgument(
                "presign ttl must be positive".into(),
            ));
        }
        let key = self.object_key(id);
        let url = self
            .bounded(self.backend.presign_put(key.as_str(), ttl))
            .await
            .inspect_err(|err| error!("Failed to generate upload URL for document {}: {}", id, err))?;

        debug!(
            "Generated upload URL for document {} (expires in {} seconds)",
            id,
            ttl.as_secs()
        );
        Ok(PresignedUploadGrant {
            key,
            url,
            expires_in: ttl,
        })
    }

    /// Full content stored under the literal `path`.
    pub async fn get_by_path(&self, path: &str) -> ContentResult<Bytes> {
        let data = self
            .bounded(self.backend.get_object(path))
            .await
            .inspect_err(|err| error!("Failed to retrieve content by path {}: {}", path, err))?;
        debug!("Retrieved content by path {} ({} bytes)", path, data.len());
        Ok(data)
    }

    /// Chunk stream of the object under the literal `path`.
    pub async fn get_stream_by_path(&self, path: &str) -> ContentResult<ChunkStream> {
        Ok(self.open_stream(path).await?.chunks)
    }

    /// Delete the object under the literal `path`.
    pub async fn delete_by_path(&self, path: &str) -> ContentResult<()> {
        self.remove(path).await?;
        debug!("Deleted content by path {}", path);
        Ok(())
    }

    /// Whether the backend container is reachable. Used by readiness checks.
    pub async fn check_backend(&self) -> ContentResult<()> {
        self.bounded(self.backend.check_bucket())
            .await
            .inspect_err(|err| error!("Backend readiness check failed: {}", err))
    }

    async fn open_stream(&self, key: &str) -> ContentResult<StreamedObject> {
        let StreamedObject { metadata, chunks } = self
            .bounded(self.backend.get_object_stream(key))
            .await
            .inspect_err(|err| error!("Failed to stream content for {}: {}", key, err))?;

        let key = key.to_string();
        Ok(StreamedObject {
            metadata,
            chunks: chunks
                .inspect(move |chunk| {
                    if let Err(err) = chunk {
                        error!("Error streaming content for {}: {}", key, err);
                    }
                })
                .boxed(),
        })
    }

    async fn remove(&self, key: &str) -> ContentResult<()> {
        self.bounded(self.backend.delete_object(key))
            .await
            .inspect_err(|err| error!("Failed to delete content at {}: {}", key, err))
    }
}
