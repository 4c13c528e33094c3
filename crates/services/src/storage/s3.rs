use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use shorts_config::S3Settings;
use tokio_util::sync::CancellationToken;

use super::{ObjectStorage, StorageError};

/// S3-compatible storage (AWS, MinIO) with path-style addressing.
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "shorts-config",
        );
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(settings.endpoint.clone())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

fn request_error(operation: &'static str, err: impl std::error::Error) -> StorageError {
    StorageError::Request {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        result = fut => result,
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, StorageError> {
        cancellable(cancel, async {
            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(true),
                Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
                Err(err) => Err(request_error("head_bucket", err)),
            }
        })
        .await
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        cancellable(cancel, async {
            match self.client.create_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(()),
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
                {
                    Ok(())
                }
                Err(err) => Err(request_error("create_bucket", err)),
            }
        })
        .await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &Path,
        size: u64,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        cancellable(cancel, async {
            let stream = ByteStream::from_path(body)
                .await
                .map_err(|e| request_error("put_object", e))?;
            let length = i64::try_from(size).map_err(|_| StorageError::Request {
                operation: "put_object",
                message: format!("object too large: {size} bytes"),
            })?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(stream)
                .content_length(length)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| request_error("put_object", e))?;
            Ok(())
        })
        .await
    }

    async fn presigned_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, StorageError> {
        cancellable(cancel, async {
            let config =
                PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Presign(e.to_string()))?;
            let request = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| StorageError::Presign(DisplayErrorContext(e).to_string()))?;
            Ok(request.uri().to_string())
        })
        .await
    }
}
