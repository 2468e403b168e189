//! Defines routes for all document content operations.
//!
//! ## Structure
//! - **Document endpoints** (keys derived from the configured prefix)
//!   - `PUT    /documents/{id}`: store content
//!   - `GET    /documents/{id}`: stream content (honors `Range: bytes=a-b`)
//!   - `HEAD   /documents/{id}`: retrieve metadata only
//!   - `DELETE /documents/{id}`: delete content
//!   - `GET    /documents/{id}/checksum`: digest of the content
//!   - `POST   /documents/{id}/checksum/verify`: compare against an expected digest
//!   - `POST   /documents/{id}/upload-url`: pre-signed upload URL
//!
//! - **Path endpoints** (literal keys, no prefix)
//!   - `GET    /objects/{*key}`: stream object
//!   - `DELETE /objects/{*key}`: delete object
//!
//! The wildcard `*key` allows nested keys like `archive/2025/report.pdf`.

use crate::{
    handlers::{
        content_handlers::{
            create_upload_url, delete_content, delete_object_by_path, get_checksum, get_content,
            get_object_by_path, head_content, upload_content, verify_checksum,
        },
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for all content routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Document routes
        .route(
            "/documents/{id}",
            put(upload_content)
                .get(get_content)
                .head(head_content)
                .delete(delete_content),
        )
        .route("/documents/{id}/checksum", get(get_checksum))
        .route("/documents/{id}/checksum/verify", post(verify_checksum))
        .route("/documents/{id}/upload-url", post(create_upload_url))
        // Literal-key routes
        .route(
            "/objects/{*key}",
            get(get_object_by_path).delete(delete_object_by_path),
        )
}
