//! Object storage for finished shorts.

pub mod s3;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use s3::S3Storage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 {operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
    #[error("Presign failed: {0}")]
    Presign(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cancelled")]
    Cancelled,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn bucket_exists(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, StorageError>;

    /// Creates `bucket`; succeeds if it is already ours.
    async fn create_bucket(&self, bucket: &str, cancel: &CancellationToken)
    -> Result<(), StorageError>;

    /// Streams the file at `body` to `bucket/key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &Path,
        size: u64,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError>;

    /// Time-limited GET URL for `bucket/key`.
    async fn presigned_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, StorageError>;
}

/// Creates `bucket` unless it already exists.
pub async fn ensure_bucket(
    storage: &dyn ObjectStorage,
    bucket: &str,
    cancel: &CancellationToken,
) -> Result<(), StorageError> {
    if storage.bucket_exists(bucket, cancel).await? {
        return Ok(());
    }
    tracing::info!(bucket, "Creating bucket");
    storage.create_bucket(bucket, cancel).await
}
