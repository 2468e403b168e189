//! HTTP handlers for document content operations.
//! Streams bodies in both directions and delegates storage concerns to
//! `ContentStore`.

use crate::{
    backend::StreamedObject,
    checksum::ChecksumAlgorithm,
    errors::{AppError, ContentError},
    models::{BlobMetadata, PresignedUploadGrant},
    services::ContentStore,
    state::UploadLimit,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use http_body_util::{LengthLimitError, Limited};
use serde::{Deserialize, Serialize};
use std::{io, time::Duration};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_UPLOAD_TTL_SECS: u64 = 15 * 60;

#[derive(Debug, Deserialize)]
pub struct ChecksumQuery {
    pub algorithm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyChecksumReq {
    pub expected: String,
    pub algorithm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlQuery {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredResponse {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChecksumResponse {
    pub algorithm: String,
    pub checksum: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyChecksumResponse {
    pub matches: bool,
}

/// PUT `/documents/{id}`: store the request body as the document content.
///
/// Bodies larger than the configured upload limit are refused with 413,
/// up front when `Content-Length` already says so.
pub async fn upload_content(
    State(store): State<ContentStore>,
    State(UploadLimit(limit)): State<UploadLimit>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if content_length.is_some_and(|declared| declared > limit) {
        return Err(payload_too_large(limit));
    }

    let limited = Limited::new(body, usize::try_from(limit).unwrap_or(usize::MAX));
    let stream = Body::new(limited)
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let key = match store
        .store_stream(&id, stream, &content_type, content_length)
        .await
    {
        Ok(key) => key,
        Err(ContentError::StreamRead(err)) if exceeds_limit(&err) => {
            return Err(payload_too_large(limit));
        }
        Err(err) => return Err(err.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(StoredResponse {
            key: key.into_string(),
        }),
    ))
}

/// GET `/documents/{id}`: stream the content, or a single inclusive range
/// when a `Range: bytes=start-end` header is present.
///
/// Range headers that are not one closed byte range are ignored and the
/// whole object is returned.
pub async fn get_content(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_byte_range);

    if let Some((start, end)) = range {
        let data = store.get_range(&id, start, end).await?;

        let mut response = Response::new(Body::from(data));
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        if let Ok(value) = HeaderValue::from_str(&format!("bytes {}-{}/*", start, end)) {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }
        return Ok(response);
    }

    let StreamedObject { metadata, chunks } = store.get_stream_with_metadata(&id).await?;

    let mut response = Response::new(Body::from_stream(chunks));
    *response.status_mut() = StatusCode::OK;
    set_content_headers(response.headers_mut(), &metadata);
    Ok(response)
}

/// HEAD `/documents/{id}`: same headers as GET but no body.
pub async fn head_content(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let meta = store.metadata(&id).await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_content_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/documents/{id}`
pub async fn delete_content(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/documents/{id}/checksum?algorithm=SHA-256`
pub async fn get_checksum(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
    Query(q): Query<ChecksumQuery>,
) -> Result<Json<ChecksumResponse>, AppError> {
    let algorithm = q
        .algorithm
        .unwrap_or_else(|| ChecksumAlgorithm::Sha256.name().to_string());
    let checksum = store.checksum(&id, &algorithm).await?;
    Ok(Json(ChecksumResponse {
        algorithm,
        checksum,
    }))
}

/// POST `/documents/{id}/checksum/verify`
pub async fn verify_checksum(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
    Json(req): Json<VerifyChecksumReq>,
) -> Result<Json<VerifyChecksumResponse>, AppError> {
    let algorithm = req
        .algorithm
        .unwrap_or_else(|| ChecksumAlgorithm::Sha256.name().to_string());
    let matches = store
        .verify_checksum(&id, &req.expected, &algorithm)
        .await?;
    Ok(Json(VerifyChecksumResponse { matches }))
}

/// POST `/documents/{id}/upload-url?ttl_secs=900`
pub async fn create_upload_url(
    State(store): State<ContentStore>,
    Path(id): Path<String>,
    Query(q): Query<UploadUrlQuery>,
) -> Result<Json<PresignedUploadGrant>, AppError> {
    let ttl = Duration::from_secs(q.ttl_secs.unwrap_or(DEFAULT_UPLOAD_TTL_SECS));
    let grant = store.presign_upload(&id, ttl).await?;
    Ok(Json(grant))
}

/// GET `/objects/{*key}`: stream an object by its literal key.
pub async fn get_object_by_path(
    State(store): State<ContentStore>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let stream = store.get_stream_by_path(&key).await?;
    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
    );
    Ok(response)
}

/// DELETE `/objects/{*key}`
pub async fn delete_object_by_path(
    State(store): State<ContentStore>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_by_path(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_content_headers(headers: &mut HeaderMap, meta: &BlobMetadata) {
    let content_type = meta.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.content_length.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref() {
        let quoted = format!("\"{}\"", etag);
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Some(modified) = meta.last_modified {
        if let Ok(value) = HeaderValue::from_str(&modified.to_rfc2822()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

fn payload_too_large(limit: u64) -> AppError {
    AppError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds the {} byte upload limit", limit),
    )
}

/// Whether a body read failed because the upload limit was hit.
fn exceeds_limit(err: &io::Error) -> bool {
    let mut source = err
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Parse a single closed range, `bytes=start-end`.
fn parse_byte_range(value: &str) -> Option<(u64, u64)> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}
