//! Amazon S3 backend built on `aws-sdk-s3`.
//!
//! Each trait method is one SDK call. Retries and per-attempt timeouts are
//! configured on the SDK client; nothing is retried here.

use super::{ObjectBackend, STREAM_CHUNK_SIZE, StreamedObject};
use crate::{
    config::StoreSettings,
    errors::{ContentError, ContentResult},
    models::{BlobMetadata, RangedBytes, StoredObject},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_s3::{
    Client,
    config::Credentials,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as AwsDateTime},
    types::{ServerSideEncryption, StorageClass},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{fmt, time::Duration};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Query parameter carrying the per-request uniqueness token of a pre-signed URL.
const PRESIGN_TOKEN_PARAM: &str = "x-upload-token";

/// Error codes S3 uses for an absent object. HEAD answers carry no code at all.
const MISSING_OBJECT_CODES: [&str; 2] = ["NoSuchKey", "NotFound"];

/// Server-side encryption requested on every write.
#[derive(Clone, Debug, PartialEq)]
enum Encryption {
    Aes256,
    Kms(String),
}

/// Write-time settings passed through to S3 untouched.
#[derive(Clone, Debug)]
struct WriteOptions {
    storage_class: StorageClass,
    encryption: Option<Encryption>,
    multipart_threshold: Option<u64>,
    multipart_part_size: u64,
}

impl WriteOptions {
    fn from_settings(settings: &StoreSettings) -> Self {
        let encryption = settings.enable_encryption.then(|| match &settings.kms_key_id {
            Some(key_id) => Encryption::Kms(key_id.clone()),
            None => Encryption::Aes256,
        });
        Self {
            storage_class: StorageClass::from(settings.storage_class.as_str()),
            encryption,
            multipart_threshold: settings
                .enable_multipart
                .then_some(settings.multipart_threshold),
            multipart_part_size: settings.multipart_part_size.max(1),
        }
    }
}

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    write: WriteOptions,
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Build a client from `settings`.
    ///
    /// With a static key pair the client is configured directly; otherwise the
    /// default AWS provider chain (environment, profile, instance role) is loaded.
    pub async fn new(settings: &StoreSettings) -> ContentResult<Self> {
        settings.validate()?;
        let region = Region::new(settings.region.clone());

        let mut builder = match settings.static_credentials() {
            Some((access_key, secret_key)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "content-store-settings",
                )),
            None => {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&sdk_config)
            }
        };

        if let Some(endpoint) = settings.endpoint.as_deref() {
            builder = builder.endpoint_url(normalize_endpoint(endpoint));
        }

        builder = builder
            .force_path_style(settings.path_style_access)
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(settings.connection_timeout)
                    .read_timeout(settings.socket_timeout)
                    .build(),
            )
            .retry_config(RetryConfig::standard().with_max_attempts(settings.max_retries + 1));

        let backend = Self::from_client(Client::from_conf(builder.build()), settings);
        debug!("S3 backend initialized with bucket: {}", backend.bucket);
        Ok(backend)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, settings: &StoreSettings) -> Self {
        Self {
            client,
            bucket: settings.bucket_name.clone(),
            write: WriteOptions::from_settings(settings),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn put_object(&self, key: &str, object: StoredObject) -> ContentResult<()> {
        let size = object.len() as u64;
        if let Some(threshold) = self.write.multipart_threshold {
            if size > threshold {
                warn!(
                    "object {} ({} bytes) exceeds multipart threshold {} ({} parts of {} bytes); writing with a single PUT",
                    key,
                    size,
                    threshold,
                    size.div_ceil(self.write.multipart_part_size),
                    self.write.multipart_part_size
                );
            }
        }

        let checksum = B64.encode(md5::compute(&object.data).0);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(object.content_type)
            .content_length(size as i64)
            .content_md5(checksum)
            .storage_class(self.write.storage_class.clone())
            .body(ByteStream::from(object.data));

        request = match &self.write.encryption {
            Some(Encryption::Aes256) => request.server_side_encryption(ServerSideEncryption::Aes256),
            Some(Encryption::Kms(key_id)) => request
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(key_id),
            None => request,
        };

        request
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> ContentResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|err| ContentError::BackendUnavailable(err.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> ContentResult<RangedBytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|err| map_range_error(err, key, start, end))?;

        let object_length = output.content_range().and_then(content_range_total);
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| ContentError::BackendUnavailable(err.to_string()))?
            .into_bytes();

        Ok(RangedBytes {
            data,
            object_length,
        })
    }

    async fn get_object_stream(&self, key: &str) -> ContentResult<StreamedObject> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key))?;

        let metadata = blob_metadata(
            key,
            output.content_length(),
            output.content_type(),
            output.e_tag(),
            output.last_modified(),
        );

        // The body owns the connection; dropping the stream releases it.
        let reader = output.body.into_async_read();
        let chunks = ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE)
            .map(|chunk| chunk.map_err(|err| ContentError::BackendUnavailable(err.to_string())));
        Ok(StreamedObject {
            metadata,
            chunks: chunks.boxed(),
        })
    }

    async fn head_object(&self, key: &str) -> ContentResult<BlobMetadata> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key))?;

        Ok(blob_metadata(
            key,
            output.content_length(),
            output.content_type(),
            output.e_tag(),
            output.last_modified(),
        ))
    }

    async fn delete_object(&self, key: &str) -> ContentResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, key))?;
        Ok(())
    }

    async fn presign_put(&self, key: &str, ttl: Duration) -> ContentResult<Url> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|err| ContentError::InvalidArgument(format!("invalid presign ttl: {err}")))?;

        // SigV4 timestamps have second resolution; the token keeps grants
        // issued within the same second distinct. It is signed with the rest.
        let token = Uuid::new_v4().to_string();
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .customize()
            .mutate_request(move |req| {
                let separator = if req.uri().contains('?') { '&' } else { '?' };
                let uri = format!("{}{}{}={}", req.uri(), separator, PRESIGN_TOKEN_PARAM, token);
                if let Err(err) = req.set_uri(uri) {
                    warn!("failed to attach upload token to presigned request: {}", err);
                }
            })
            .presigned(config)
            .await
            .map_err(|err| ContentError::BackendUnavailable(DisplayErrorContext(&err).to_string()))?;

        Url::parse(presigned.uri())
            .map_err(|err| ContentError::BackendUnavailable(format!("invalid presigned url: {err}")))
    }

    async fn check_bucket(&self) -> ContentResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| match map_sdk_error(err, &self.bucket) {
                ContentError::NotFound(bucket) => {
                    ContentError::BackendRejected(format!("bucket `{}` does not exist", bucket))
                }
                other => other,
            })?;
        Ok(())
    }
}

fn blob_metadata(
    key: &str,
    content_length: Option<i64>,
    content_type: Option<&str>,
    e_tag: Option<&str>,
    last_modified: Option<&AwsDateTime>,
) -> BlobMetadata {
    BlobMetadata {
        key: key.to_string(),
        content_length: content_length.unwrap_or(0).max(0) as u64,
        content_type: content_type.map(str::to_string),
        etag: e_tag.map(|tag| tag.trim_matches('"').to_string()),
        last_modified: last_modified
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())),
    }
}

/// Prepend `http://` to bare `host:port` endpoints.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Total object length from a `Content-Range` value such as `bytes 1-3/5`.
fn content_range_total(content_range: &str) -> Option<u64> {
    content_range.rsplit_once('/')?.1.trim().parse().ok()
}

fn service_status<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(service_err) => Some(service_err.raw().status().as_u16()),
        _ => None,
    }
}

/// Like `map_sdk_error`, with 416 reported as an unsatisfiable range.
fn map_range_error<E>(err: SdkError<E>, key: &str, start: u64, end: u64) -> ContentError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if service_status(&err) == Some(416) {
        ContentError::InvalidRange {
            key: key.to_string(),
            start,
            end,
        }
    } else {
        map_sdk_error(err, key)
    }
}

/// Classify an SDK failure.
///
/// A 404 is `NotFound` only when it names a missing object (or carries no
/// code, as HEAD answers do). `NoSuchBucket` and other 404s are rejections.
/// Transport failures, timeouts and 5xx answers are `BackendUnavailable`;
/// every other rejection is `BackendRejected`.
fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> ContentError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service_err) => match service_err.raw().status().as_u16() {
            404 => match service_err.err().code() {
                None => ContentError::NotFound(key.to_string()),
                Some(code) if MISSING_OBJECT_CODES.contains(&code) => {
                    ContentError::NotFound(key.to_string())
                }
                Some(_) => ContentError::BackendRejected(detail),
            },
            status if status >= 500 => ContentError::BackendUnavailable(detail),
            _ => ContentError::BackendRejected(detail),
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ContentError::BackendUnavailable(detail)
        }
        _ => ContentError::BackendRejected(detail),
    }
}
