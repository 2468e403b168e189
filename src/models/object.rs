//! Values describing stored content and what the backend reports about it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A payload handed to the backend for writing.
///
/// The backend is the only place the bytes live once the write returns.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    /// Raw content.
    pub data: Bytes,

    /// MIME type supplied by the caller.
    pub content_type: String,
}

impl StoredObject {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a head query. Never cached; every call re-fetches it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlobMetadata {
    /// Object key the metadata was read from.
    pub key: String,

    /// Content length in bytes.
    pub content_length: u64,

    /// Content type recorded by the backend, if any.
    pub content_type: Option<String>,

    /// Entity tag without surrounding quotes.
    pub etag: Option<String>,

    /// Last modification time reported by the backend.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Bytes returned by a ranged read together with the full object length.
#[derive(Clone, Debug, PartialEq)]
pub struct RangedBytes {
    pub data: Bytes,

    /// Total length of the object the range was cut from, when the backend reports it.
    pub object_length: Option<u64>,
}
