//! Core data models for the document content store.
//!
//! Every value here is transient: it lives for the duration of the call
//! that produces it. The backend is the sole persistence layer.

pub mod key;
pub mod object;
pub mod presign;

pub use key::{DEFAULT_PATH_PREFIX, KeyPrefix, ObjectKey};
pub use object::{BlobMetadata, RangedBytes, StoredObject};
pub use presign::PresignedUploadGrant;
