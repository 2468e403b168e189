use anyhow::{Context, Result};
use axum::Router;
use s3_content_store::{
    AppState, ContentStore, MemoryBackend,
    config::{AppConfig, BackendKind},
    models::KeyPrefix,
    routes,
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting content-store with backend {:?}, bucket {:?}, prefix {:?}",
        cfg.backend,
        cfg.store.bucket_name,
        cfg.store.path_prefix
    );

    // --- Initialize core service ---
    let store = match cfg.backend {
        BackendKind::S3 => ContentStore::from_settings(&cfg.store)
            .await
            .context("initializing S3 backend")?,
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend; content is lost on restart");
            let store = ContentStore::new(
                Arc::new(MemoryBackend::new()),
                KeyPrefix::new(cfg.store.path_prefix.clone()),
            );
            match cfg.store.operation_timeout {
                Some(limit) => store.with_call_timeout(limit),
                None => store,
            }
        }
    };

    // --- Build router ---
    let state = AppState::new(store).with_upload_limit(cfg.max_upload_bytes);
    let app: Router = routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
