//! In-process backend keeping objects in a map.
//!
//! Useful for local runs and tests. It mirrors the observable behavior of the
//! S3 backend: overwrite on put, idempotent delete, truncated range ends and
//! a distinct pre-signed URL per request.

use super::{ObjectBackend, STREAM_CHUNK_SIZE, StreamedObject};
use crate::{
    errors::{ContentError, ContentResult},
    models::{BlobMetadata, RangedBytes, StoredObject},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::debug;
use url::Url;
use uuid::Uuid;

const MEMORY_URL_BASE: &str = "memory://content-store/";

#[derive(Clone, Debug)]
struct MemoryEntry {
    object: StoredObject,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl MemoryEntry {
    fn metadata(&self, key: &str) -> BlobMetadata {
        BlobMetadata {
            key: key.to_string(),
            content_length: self.object.len() as u64,
            content_type: Some(self.object.content_type.clone()),
            etag: Some(self.etag.clone()),
            last_modified: Some(self.last_modified),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether an object is stored under the literal `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    fn entry(&self, key: &str) -> ContentResult<MemoryEntry> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn put_object(&self, key: &str, object: StoredObject) -> ContentResult<()> {
        let etag = format!("{:x}", md5::compute(&object.data));
        let size = object.len();
        self.objects.write().insert(
            key.to_string(),
            MemoryEntry {
                object,
                etag,
                last_modified: Utc::now(),
            },
        );
        debug!("memory backend stored {} ({} bytes)", key, size);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> ContentResult<Bytes> {
        Ok(self.entry(key)?.object.data)
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> ContentResult<RangedBytes> {
        let data = self.entry(key)?.object.data;
        let len = data.len() as u64;
        if start > end || start >= len {
            return Err(ContentError::InvalidRange {
                key: key.to_string(),
                start,
                end,
            });
        }
        let last = end.min(len - 1);
        Ok(RangedBytes {
            data: data.slice(start as usize..=last as usize),
            object_length: Some(len),
        })
    }

    async fn get_object_stream(&self, key: &str) -> ContentResult<StreamedObject> {
        let entry = self.entry(key)?;
        let data = entry.object.data.clone();
        let chunks: Vec<ContentResult<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|offset| {
                let end = (offset + STREAM_CHUNK_SIZE).min(data.len());
                Ok(data.slice(offset..end))
            })
            .collect();
        Ok(StreamedObject {
            metadata: entry.metadata(key),
            chunks: stream::iter(chunks).boxed(),
        })
    }

    async fn head_object(&self, key: &str) -> ContentResult<BlobMetadata> {
        Ok(self.entry(key)?.metadata(key))
    }

    async fn delete_object(&self, key: &str) -> ContentResult<()> {
        if self.objects.write().remove(key).is_none() {
            debug!("memory backend delete of absent key {}", key);
        }
        Ok(())
    }

    async fn presign_put(&self, key: &str, ttl: Duration) -> ContentResult<Url> {
        let mut url = Url::parse(MEMORY_URL_BASE)
            .map_err(|err| ContentError::BackendUnavailable(err.to_string()))?;
        url.set_path(key);
        url.query_pairs_mut()
            .append_pair("expires_in", &ttl.as_secs().to_string())
            .append_pair("token", &Uuid::new_v4().to_string());
        Ok(url)
    }

    async fn check_bucket(&self) -> ContentResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let backend = MemoryBackend::new();
        backend
            .put_object("documents/a", StoredObject::new("first", "text/plain"))
            .await
            .unwrap();
        backend
            .put_object("documents/a", StoredObject::new("second!", "text/plain"))
            .await
            .unwrap();

        assert_eq!(backend.object_count(), 1);
        assert_eq!(
            backend.get_object("documents/a").await.unwrap(),
            Bytes::from("second!")
        );
    }

    #[tokio::test]
    async fn range_end_past_object_is_truncated_and_length_reported() {
        let backend = MemoryBackend::new();
        backend
            .put_object("k", StoredObject::new("hello", "text/plain"))
            .await
            .unwrap();

        let ranged = backend.get_object_range("k", 3, 99).await.unwrap();
        assert_eq!(ranged.data, Bytes::from("lo"));
        assert_eq!(ranged.object_length, Some(5));

        let err = backend.get_object_range("k", 5, 6).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidRange { start: 5, .. }));
    }

    #[tokio::test]
    async fn stream_yields_8k_chunks() {
        let backend = MemoryBackend::new();
        let payload = vec![7u8; STREAM_CHUNK_SIZE * 2 + 10];
        backend
            .put_object("big", StoredObject::new(payload.clone(), "application/octet-stream"))
            .await
            .unwrap();

        let opened = backend.get_object_stream("big").await.unwrap();
        assert_eq!(opened.metadata.content_length, payload.len() as u64);
        let chunks: Vec<Bytes> = opened
            .chunks
            .try_collect()
            .await
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![STREAM_CHUNK_SIZE, STREAM_CHUNK_SIZE, 10]);
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn empty_object_streams_no_chunks() {
        let backend = MemoryBackend::new();
        backend
            .put_object("empty", StoredObject::new(Bytes::new(), "text/plain"))
            .await
            .unwrap();
        let chunks: Vec<Bytes> = backend
            .get_object_stream("empty")
            .await
            .unwrap()
            .chunks
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn head_reports_md5_etag_and_content_type() {
        let backend = MemoryBackend::new();
        backend
            .put_object("documents/doc-1", StoredObject::new("hello", "text/plain"))
            .await
            .unwrap();

        let meta = backend.head_object("documents/doc-1").await.unwrap();
        assert_eq!(meta.content_length, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
    }

    #[tokio::test]
    async fn presigned_urls_are_absolute_and_distinct() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(600);
        let first = backend.presign_put("documents/doc-1", ttl).await.unwrap();
        let second = backend.presign_put("documents/doc-1", ttl).await.unwrap();

        assert_eq!(first.scheme(), "memory");
        assert_eq!(first.path(), "/documents/doc-1");
        assert!(first.query().unwrap().contains("expires_in=600"));
        assert_ne!(first, second);
    }
}
