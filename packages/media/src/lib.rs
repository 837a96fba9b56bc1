#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Blob storage client for uploaded report media.
//!
//! Media files attached to reports and comments are uploaded to an
//! S3-compatible bucket (Cloudflare R2) under caller-generated,
//! collision-free keys, and referenced from report records by their
//! public URLs. The store never generates keys itself.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |
//! | `MEDIA_PUBLIC_BASE_URL` | Yes | Public base URL the bucket is served from |
//! | `MEDIA_BUCKET` | No | Bucket name (default `report-media`) |

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

/// Default bucket name for report media.
const DEFAULT_BUCKET: &str = "report-media";

/// Errors that can occur during media storage operations.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A media file selected by the user, before upload.
///
/// Ownership transfers to the submission pipeline at submit time; after a
/// successful upload only the public URL is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    /// Original file name (used to preserve the extension).
    pub file_name: String,
    /// MIME content type, preserved on the stored object.
    pub content_type: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

/// Generates a fresh, globally unique object key for an attachment.
///
/// A random UUID plus the original file extension, so concurrent
/// submissions can never collide.
#[must_use]
pub fn object_key(file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}

/// External binary object storage for uploaded media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads one object under the given key and returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Upload`] if the store rejects the object.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, MediaError>;
}

/// [`MediaStore`] backed by a Cloudflare R2 bucket.
pub struct R2MediaStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl R2MediaStore {
    /// Creates a new R2 media store from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::MissingEnv`] if any required variable is
    /// unset.
    pub fn from_env() -> Result<Self, MediaError> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;
        let public_base_url = require_env("MEDIA_PUBLIC_BASE_URL")?;
        let bucket =
            std::env::var("MEDIA_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaStore for R2MediaStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, MediaError> {
        let size = bytes.len();
        log::info!("Uploading s3://{}/{key} ({size} bytes)", self.bucket);

        let body = aws_sdk_s3::primitives::ByteStream::from(bytes);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| MediaError::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(format!("{}/{key}", self.public_base_url))
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, MediaError> {
    std::env::var(name).map_err(|_| MediaError::MissingEnv {
        name: name.to_string(),
    })
}
