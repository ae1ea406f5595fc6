use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::info;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectStore};

/// Connection settings for an S3-compatible endpoint (MinIO, Garage, AWS).
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

/// Blob store backed by an S3-compatible service.
///
/// Uses path-style addressing and a fixed signing region so that MinIO-style
/// endpoints work without any region configuration. TLS is whatever the
/// endpoint URL says.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn connect(config: &S3Config) -> Result<Self, StorageError> {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&config.endpoint)
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "pixie-static",
            ))
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&base).force_path_style(true).build();
        let client = Client::from_conf(s3_config);

        info!(endpoint = %config.endpoint, bucket = %config.bucket, "S3 object store initialized");

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false) =>
            {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(from_sdk)?;
                info!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(err) => Err(from_sdk(err)),
        }
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<(BoxReader, Option<String>), StorageError> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    StorageError::NotFound(key.to_string())
                } else {
                    from_sdk(err)
                }
            })?;

        let content_type = out.content_type().map(|s| s.to_string());
        let reader: BoxReader = Box::new(out.body.into_async_read());
        Ok((reader, content_type))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }
}

/// Collapse an SDK error into the adapter's taxonomy.
fn from_sdk<E>(err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StorageError::Transport(err.to_string())
        }
        SdkError::ServiceError(_) => match err.code() {
            Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
                StorageError::Auth(err.to_string())
            }
            Some("NoSuchKey") | Some("NoSuchBucket") | Some("NotFound") => {
                StorageError::NotFound(err.to_string())
            }
            _ => StorageError::Other(err.to_string()),
        },
        _ => StorageError::Other(err.to_string()),
    }
}
