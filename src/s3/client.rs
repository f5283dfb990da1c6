use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use futures::StreamExt;
use std::ops::RangeInclusive;

use super::store::{ByteStream, ObjectMetadata, ObjectStore};
use crate::config::{self, Settings};
use crate::error::{Error, Result};

/// Wrapper around AWS S3 client
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new S3 client from settings
    pub async fn new(settings: &Settings) -> Result<Self> {
        let client = config::create_s3_client(settings).await;
        Ok(S3Client { client })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        S3Client { client }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn object_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Format an inclusive range as an HTTP Range header value
pub(crate) fn range_header(range: &RangeInclusive<u64>) -> String {
    format!("bytes={}-{}", range.start(), range.end())
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(service) if service.is_not_found() => Error::NotFound(object_uri(bucket, key)),
                _ => unavailable(bucket, key, &e),
            })?;

        Ok(ObjectMetadata {
            size: resp.content_length().unwrap_or(0).max(0) as u64,
        })
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeInclusive<u64>,
    ) -> Result<ByteStream> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range_header(&range))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(service) if service.is_no_such_key() => {
                    Error::NotFound(object_uri(bucket, key))
                }
                _ => unavailable(bucket, key, &e),
            })?;

        let uri = object_uri(bucket, key);
        let body = futures::stream::unfold(resp.body, move |mut body| {
            let uri = uri.clone();
            async move {
                body.next().await.map(|chunk| {
                    let chunk = chunk.map_err(|e| {
                        Error::Unavailable(format!("Failed to read body of {}: {}", uri, e))
                    });
                    (chunk, body)
                })
            }
        });

        Ok(body.boxed())
    }
}

fn unavailable<E, R>(bucket: &str, key: &str, err: &SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    Error::Unavailable(format!(
        "Request for {} failed: {}",
        object_uri(bucket, key),
        aws_sdk_s3::error::DisplayErrorContext(err)
    ))
}
