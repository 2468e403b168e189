//! Shared router state.

use crate::{config::DEFAULT_MAX_UPLOAD_BYTES, services::ContentStore};
use axum::extract::FromRef;

/// Largest request body the upload route drains, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimit(pub u64);

impl Default for UploadLimit {
    fn default() -> Self {
        Self(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: ContentStore,
    pub upload_limit: UploadLimit,
}

impl AppState {
    pub fn new(store: ContentStore) -> Self {
        Self {
            store,
            upload_limit: UploadLimit::default(),
        }
    }

    pub fn with_upload_limit(mut self, max_bytes: u64) -> Self {
        self.upload_limit = UploadLimit(max_bytes);
        self
    }
}

impl FromRef<AppState> for ContentStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for UploadLimit {
    fn from_ref(state: &AppState) -> Self {
        state.upload_limit
    }
}
