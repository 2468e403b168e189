use crate::errors::{ContentError, ContentResult};
use crate::models::DEFAULT_PATH_PREFIX;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";
pub const DEFAULT_MULTIPART_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Settings for the S3-backed content store.
///
/// `bucket_name` and `region` are required; everything else has the
/// defaults listed on each field.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub bucket_name: String,
    pub region: String,

    /// Static credential pair. When absent the SDK resolves credentials from
    /// the environment, profile or instance role.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,

    /// Overrides the default endpoint, for S3-compatible services.
    pub endpoint: Option<String>,

    /// Key-derivation prefix. Default `documents/`.
    pub path_prefix: String,

    /// Path-style addressing (`endpoint/bucket/key`). Default `false`.
    pub path_style_access: bool,

    /// Connect timeout. Default 30s.
    pub connection_timeout: Duration,

    /// Read timeout per attempt. Default 30s.
    pub socket_timeout: Duration,

    /// Retry budget handed to the SDK. Default 3.
    pub max_retries: u32,

    /// Request server-side encryption on writes. Default `true`.
    pub enable_encryption: bool,
    pub kms_key_id: Option<String>,

    /// Storage tier for new objects. Default `STANDARD`.
    pub storage_class: String,

    /// Multipart thresholds. Large payloads are still written with one PUT.
    pub enable_multipart: bool,
    pub multipart_threshold: u64,
    pub multipart_part_size: u64,

    /// Upper bound on any single store call. `None` leaves it to the SDK timeouts.
    pub operation_timeout: Option<Duration>,
}

impl StoreSettings {
    pub fn new(bucket_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: region.into(),
            access_key: None,
            secret_key: None,
            endpoint: None,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            path_style_access: false,
            connection_timeout: DEFAULT_TIMEOUT,
            socket_timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            enable_encryption: true,
            kms_key_id: None,
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
            enable_multipart: true,
            multipart_threshold: DEFAULT_MULTIPART_SIZE,
            multipart_part_size: DEFAULT_MULTIPART_SIZE,
            operation_timeout: None,
        }
    }

    pub fn validate(&self) -> ContentResult<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(ContentError::Config("bucket name is required".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ContentError::Config("region is required".into()));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ContentError::Config(
                "access key and secret key must be set together".into(),
            ));
        }
        if self.multipart_part_size == 0 {
            return Err(ContentError::Config(
                "multipart part size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Static credentials, if both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Which backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    S3,
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    /// Largest request body accepted by the upload route.
    pub max_upload_bytes: u64,
    pub store: StoreSettings,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Document content store backed by S3")]
pub struct Args {
    /// Host to bind to (overrides CONTENT_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CONTENT_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides CONTENT_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Target bucket (overrides CONTENT_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Backend region (overrides CONTENT_STORE_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services (overrides CONTENT_STORE_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Key prefix for document identifiers (overrides CONTENT_STORE_PATH_PREFIX)
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Use path-style addressing (overrides CONTENT_STORE_PATH_STYLE)
    #[arg(long)]
    pub path_style: bool,

    /// Per-call timeout in seconds (overrides CONTENT_STORE_OPERATION_TIMEOUT_SECS)
    #[arg(long)]
    pub operation_timeout_secs: Option<u64>,

    /// Upload body limit in bytes (overrides CONTENT_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        Self::from_sources(args, |name| env::var(name))
    }

    /// Merge `args` over the variables returned by `lookup` over defaults.
    ///
    /// A variable is only parsed when no argument overrides it.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env = EnvSource(lookup);

        let host = match args.host {
            Some(host) => host,
            None => env.string("CONTENT_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
        };
        let port = match args.port {
            Some(port) => port,
            None => env.parse("CONTENT_STORE_PORT")?.unwrap_or(3000),
        };
        let backend = match args.backend {
            Some(backend) => backend,
            None => match env.string("CONTENT_STORE_BACKEND") {
                Some(value) => <BackendKind as clap::ValueEnum>::from_str(&value, true)
                    .map_err(|err| anyhow::anyhow!(err))
                    .with_context(|| format!("parsing CONTENT_STORE_BACKEND value `{}`", value))?,
                None => BackendKind::S3,
            },
        };
        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => env
                .parse("CONTENT_STORE_MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let bucket = args
            .bucket
            .or_else(|| env.string("CONTENT_STORE_BUCKET"))
            .unwrap_or_default();
        let region = args
            .region
            .or_else(|| env.string("CONTENT_STORE_REGION"))
            .unwrap_or_else(|| "us-east-1".into());

        let mut store = StoreSettings::new(bucket, region);
        store.access_key = env.string("CONTENT_STORE_ACCESS_KEY");
        store.secret_key = env.string("CONTENT_STORE_SECRET_KEY");
        store.endpoint = args
            .endpoint
            .or_else(|| env.string("CONTENT_STORE_ENDPOINT"));
        if let Some(prefix) = args
            .path_prefix
            .or_else(|| env.string("CONTENT_STORE_PATH_PREFIX"))
        {
            store.path_prefix = prefix;
        }
        store.path_style_access =
            args.path_style || env.parse::<bool>("CONTENT_STORE_PATH_STYLE")?.unwrap_or(false);
        if let Some(secs) = env.parse::<u64>("CONTENT_STORE_CONNECTION_TIMEOUT_SECS")? {
            store.connection_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("CONTENT_STORE_SOCKET_TIMEOUT_SECS")? {
            store.socket_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env.parse("CONTENT_STORE_MAX_RETRIES")? {
            store.max_retries = retries;
        }
        if let Some(enabled) = env.parse("CONTENT_STORE_ENABLE_ENCRYPTION")? {
            store.enable_encryption = enabled;
        }
        store.kms_key_id = env.string("CONTENT_STORE_KMS_KEY_ID");
        if let Some(class) = env.string("CONTENT_STORE_STORAGE_CLASS") {
            store.storage_class = class;
        }
        if let Some(enabled) = env.parse("CONTENT_STORE_ENABLE_MULTIPART")? {
            store.enable_multipart = enabled;
        }
        if let Some(threshold) = env.parse("CONTENT_STORE_MULTIPART_THRESHOLD")? {
            store.multipart_threshold = threshold;
        }
        if let Some(part_size) = env.parse("CONTENT_STORE_MULTIPART_PART_SIZE")? {
            store.multipart_part_size = part_size;
        }
        let operation_timeout_secs = match args.operation_timeout_secs {
            Some(secs) => Some(secs),
            None => env.parse("CONTENT_STORE_OPERATION_TIMEOUT_SECS")?,
        };
        store.operation_timeout = operation_timeout_secs.map(Duration::from_secs);

        if backend == BackendKind::S3 {
            store.validate().context("validating S3 settings")?;
        }

        Ok(Self {
            host,
            port,
            backend,
            max_upload_bytes,
            store,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Variable source for `AppConfig::from_sources`.
struct EnvSource<F>(F);

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).ok()
    }

    /// Read and parse an optional variable.
    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.0)(name) {
            Ok(value) => value
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("parsing {} value `{}`", name, value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", name)),
        }
    }
}
