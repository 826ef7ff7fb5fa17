//! S3-based watermark storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;

use crate::store::{StoredState, WatermarkStore};

/// Stores one `{prefix}{mapping}.json` object per mapping.
///
/// A single PUT replaces the whole object, which gives the per-document
/// atomicity the trait requires.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a store using the default AWS credential chain.
    pub async fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Ok(Self::with_client(client, bucket, prefix))
    }

    pub fn with_client(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: normalize_prefix(&prefix.into()),
        }
    }

    fn key_for(&self, mapping: &str) -> String {
        format!("{}{mapping}.json", self.prefix)
    }
}

/// Empty stays empty; anything else ends with exactly one `/`.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[async_trait]
impl WatermarkStore for S3Store {
    async fn load_state(&self, mapping: &str) -> Result<Option<StoredState>> {
        let key = self.key_for(mapping);
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(e)
                    .with_context(|| format!("Failed to read s3://{}/{key}", self.bucket));
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to download s3://{}/{key}", self.bucket))?
            .into_bytes();
        let state = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt state document s3://{}/{key}", self.bucket))?;
        Ok(Some(state))
    }

    async fn save_state(&self, mapping: &str, state: &StoredState) -> Result<()> {
        let key = self.key_for(mapping);
        let body = serde_json::to_vec_pretty(state)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to write s3://{}/{key}", self.bucket))?;
        tracing::debug!("Stored state for '{}' to s3://{}/{}", mapping, self.bucket, key);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}
