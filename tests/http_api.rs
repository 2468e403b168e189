use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::stream;
use s3_content_store::{AppState, ContentStore, MemoryBackend, models::KeyPrefix, routes};
use serde_json::{Value, json};
use std::{convert::Infallible, sync::Arc};
use tower::ServiceExt;

fn app() -> Router {
    let store = ContentStore::new(Arc::new(MemoryBackend::new()), KeyPrefix::default());
    routes::routes().with_state(AppState::new(store))
}

fn app_with_upload_limit(max_bytes: u64) -> Router {
    let store = ContentStore::new(Arc::new(MemoryBackend::new()), KeyPrefix::default());
    routes::routes().with_state(AppState::new(store).with_upload_limit(max_bytes))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn put_hello(app: &Router) {
    let response = send(
        app,
        Request::builder()
            .method(Method::PUT)
            .uri("/documents/doc-1")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({ "key": "documents/doc-1" }));
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn upload_then_download() {
    let app = app();
    put_hello(&app).await;

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    assert!(response.headers().contains_key(header::ETAG));
    assert_eq!(body_bytes(response).await, b"hello");
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let app = app();
    put_hello(&app).await;

    let response = send(
        &app,
        Request::builder()
            .uri("/documents/doc-1")
            .header(header::RANGE, "bytes=1-3")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 1-3/*");
    assert_eq!(body_bytes(response).await, b"ell");
}

#[tokio::test]
async fn unsatisfiable_range_is_416() {
    let app = app();
    put_hello(&app).await;

    for range in ["bytes=2-9", "bytes=4-1", "bytes=5-5"] {
        let response = send(
            &app,
            Request::builder()
                .uri("/documents/doc-1")
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{}", range);
    }
}

#[tokio::test]
async fn unparseable_range_is_ignored() {
    let app = app();
    put_hello(&app).await;

    for range in ["bytes=3-", "bytes=-2", "bytes=0-1,3-4", "lines=1-2", "bytes=a-b"] {
        let response = send(
            &app,
            Request::builder()
                .uri("/documents/doc-1")
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "{}", range);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(body_bytes(response).await, b"hello");
    }
}

#[tokio::test]
async fn full_download_length_matches_latest_content() {
    let app = app();
    put_hello(&app).await;

    let response = send(
        &app,
        Request::builder()
            .method(Method::PUT)
            .uri("/documents/doc-1")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello, world"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "12");
    assert_eq!(body_bytes(response).await, b"hello, world");
}

#[tokio::test]
async fn declared_oversized_upload_is_413() {
    let app = app_with_upload_limit(4);

    let response = send(
        &app,
        Request::builder()
            .method(Method::PUT)
            .uri("/documents/doc-1")
            .header(header::CONTENT_LENGTH, "5")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["status"], 413);

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn streamed_oversized_upload_is_413() {
    let app = app_with_upload_limit(8);
    let chunks = stream::iter(vec![
        Ok::<_, Infallible>(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"world")),
    ]);

    let response = send(
        &app,
        Request::builder()
            .method(Method::PUT)
            .uri("/documents/doc-1")
            .body(Body::from_stream(chunks))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_at_the_limit_is_accepted() {
    let app = app_with_upload_limit(5);
    put_hello(&app).await;
}

#[tokio::test]
async fn missing_document_is_404_json() {
    let app = app();
    let response = send(&app, get("/documents/ghost")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn head_reports_metadata() {
    let app = app();
    put_hello(&app).await;

    let response = send(
        &app,
        Request::builder()
            .method(Method::HEAD)
            .uri("/documents/doc-1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
}

#[tokio::test]
async fn delete_is_idempotent() {
    let app = app();
    put_hello(&app).await;

    for _ in 0..2 {
        let response = send(
            &app,
            Request::builder()
                .method(Method::DELETE)
                .uri("/documents/doc-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checksum_and_verify() {
    let app = app();
    put_hello(&app).await;

    let response = send(&app, get("/documents/doc-1/checksum?algorithm=MD5")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "algorithm": "MD5", "checksum": "5d41402abc4b2a76b9719d911017c592" })
    );

    let response = send(&app, get("/documents/doc-1/checksum")).await;
    let body = body_json(response).await;
    assert_eq!(body["algorithm"], "SHA-256");

    let response = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/documents/doc-1/checksum/verify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "expected": "5D41402ABC4B2A76B9719D911017C592", "algorithm": "MD5" })
                    .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "matches": true }));
}

#[tokio::test]
async fn unknown_algorithm_is_400() {
    let app = app();
    put_hello(&app).await;

    let response = send(&app, get("/documents/doc-1/checksum?algorithm=WHIRLPOOL")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_url_uses_default_ttl() {
    let app = app();
    let request = || {
        Request::builder()
            .method(Method::POST)
            .uri("/documents/doc-1/upload-url")
            .body(Body::empty())
            .unwrap()
    };

    let first = body_json(send(&app, request()).await).await;
    let second = body_json(send(&app, request()).await).await;

    assert_eq!(first["key"], "documents/doc-1");
    assert_eq!(first["expires_in_secs"], 900);
    assert_ne!(first["url"], second["url"]);
}

#[tokio::test]
async fn zero_ttl_upload_url_is_400() {
    let app = app();
    let response = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/documents/doc-1/upload-url?ttl_secs=0")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn objects_route_uses_literal_keys() {
    let app = app();
    put_hello(&app).await;

    let response = send(&app, get("/objects/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"hello");

    let response = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/objects/documents/doc-1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, get("/documents/doc-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoints_report_ok() {
    let app = app();

    let response = send(&app, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/readyz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["backend"]["ok"], true);
}
