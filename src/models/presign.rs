//! Pre-signed upload grants.

use super::key::ObjectKey;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// A one-shot authorization for an external uploader to PUT a single object.
///
/// Generated per request and never persisted.
#[derive(Clone, Debug, Serialize)]
pub struct PresignedUploadGrant {
    /// Key the uploader will write to.
    pub key: ObjectKey,

    /// Absolute URL carrying the signed authorization.
    pub url: Url,

    /// How long the URL stays valid from the moment it was issued.
    #[serde(rename = "expires_in_secs", serialize_with = "serialize_secs")]
    pub expires_in: Duration,
}

fn serialize_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(value.as_secs())
}
