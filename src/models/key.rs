//! Object key derivation.
//!
//! A key is `prefix + identifier`. The prefix is normalized once, at
//! construction, so every operation derives keys the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default prefix applied to document identifiers.
pub const DEFAULT_PATH_PREFIX: &str = "documents/";

/// A normalized key prefix: empty, or ending in exactly one `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(raw: impl Into<String>) -> Self {
        let mut prefix = raw.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the object key for a caller-supplied identifier.
    pub fn key_for(&self, id: &str) -> ObjectKey {
        ObjectKey(format!("{}{}", self.0, id))
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_PREFIX)
    }
}

/// Fully-qualified name of an object in the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a literal key, bypassing any prefix.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
