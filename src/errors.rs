use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failures surfaced by the content store and its backends.
///
/// Every backend failure reaches the caller as one of these variants. The only
/// failure that is ever absorbed is `NotFound` inside `ContentStore::exists`.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid range {start}-{end} for object `{key}`")]
    InvalidRange { key: String, start: u64, end: u64 },
    #[error("unsupported checksum algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("backend rejected request: {0}")]
    BackendRejected(String),
    #[error("failed to read content stream: {0}")]
    StreamRead(#[source] io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type ContentResult<T> = Result<T, ContentError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        let status = match &err {
            ContentError::NotFound(_) => StatusCode::NOT_FOUND,
            ContentError::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ContentError::UnsupportedAlgorithm(_)
            | ContentError::InvalidArgument(_)
            | ContentError::StreamRead(_) => StatusCode::BAD_REQUEST,
            ContentError::BackendRejected(_) => StatusCode::BAD_GATEWAY,
            ContentError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ContentError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ContentError::NotFound("documents/a".into()), StatusCode::NOT_FOUND)]
    #[case(
        ContentError::InvalidRange { key: "documents/a".into(), start: 4, end: 2 },
        StatusCode::RANGE_NOT_SATISFIABLE
    )]
    #[case(ContentError::UnsupportedAlgorithm("CRC9".into()), StatusCode::BAD_REQUEST)]
    #[case(ContentError::BackendRejected("AccessDenied".into()), StatusCode::BAD_GATEWAY)]
    #[case(
        ContentError::BackendUnavailable("connect timeout".into()),
        StatusCode::SERVICE_UNAVAILABLE
    )]
    fn content_errors_map_to_http_status(#[case] err: ContentError, #[case] status: StatusCode) {
        let app: AppError = err.into();
        assert_eq!(app.status, status);
    }

    #[test]
    fn invalid_range_message_names_the_key() {
        let err = ContentError::InvalidRange {
            key: "documents/doc-1".into(),
            start: 3,
            end: 1,
        };
        assert_eq!(
            err.to_string(),
            "invalid range 3-1 for object `documents/doc-1`"
        );
    }
}
