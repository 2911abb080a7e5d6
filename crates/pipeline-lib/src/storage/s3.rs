//! S3 backend built on the AWS SDK

use super::{ObjectMeta, ObjectStore, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Artifact store backed by an S3 bucket
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Wrap an already configured SDK client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Resolve credentials and region from the default provider chain
    ///
    /// With `anonymous` set, requests are sent unsigned, which is enough to
    /// read from a public bucket.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if config.anonymous {
            loader = loader.no_credentials();
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), config.bucket.clone())
    }

    fn target(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

fn backend_error<E: std::error::Error>(operation: &'static str, target: String, err: E) -> StorageError {
    StorageError::Backend {
        operation,
        target,
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| backend_error("list", self.target(prefix), e))?;

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_default();

                objects.push(ObjectMeta {
                    key: key.to_string(),
                    last_modified,
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, prefix = %prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| backend_error("upload", self.target(key), e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    return Err(StorageError::NotFound(self.target(key)));
                }
                return Err(backend_error("download", self.target(key), e));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| backend_error("download", self.target(key), e))?;
        Ok(data.into_bytes().to_vec())
    }

    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
