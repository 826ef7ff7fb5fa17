//! Google Cloud Storage watermark storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;

use crate::s3::normalize_prefix;
use crate::store::{StoredState, WatermarkStore};

/// Stores one `{prefix}{mapping}.json` object per mapping.
///
/// A simple upload replaces the whole object, so readers see either the old
/// or the new document.
pub struct GcsStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl GcsStore {
    /// Create a store using a service account key file, or Application
    /// Default Credentials when `credentials_file` is `None`.
    pub async fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        credentials_file: Option<&str>,
    ) -> Result<Self> {
        let config = match credentials_file {
            Some(path) => {
                let creds = CredentialsFile::new_from_file(path.to_string())
                    .await
                    .with_context(|| format!("Failed to load GCS credentials from '{path}'"))?;
                ClientConfig::default()
                    .with_credentials(creds)
                    .await
                    .context("Failed to configure GCS credentials")?
            }
            None => ClientConfig::default()
                .with_auth()
                .await
                .context("Failed to initialize GCS client with application default credentials")?,
        };
        Ok(Self::with_client(Client::new(config), bucket, prefix))
    }

    pub fn with_client(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: normalize_prefix(&prefix.into()),
        }
    }

    fn object_for(&self, mapping: &str) -> String {
        object_name(&self.prefix, mapping)
    }
}

fn object_name(prefix: &str, mapping: &str) -> String {
    format!("{prefix}{mapping}.json")
}

fn is_not_found(err: &GcsError) -> bool {
    matches!(err, GcsError::Response(response) if response.code == 404)
}

#[async_trait]
impl WatermarkStore for GcsStore {
    async fn load_state(&self, mapping: &str) -> Result<Option<StoredState>> {
        let object = self.object_for(mapping);
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: object.clone(),
            ..Default::default()
        };
        let bytes = match self.client.download_object(&request, &Range::default()).await {
            Ok(bytes) => bytes,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read gs://{}/{object}", self.bucket))
            }
        };
        let state = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt state document gs://{}/{object}", self.bucket))?;
        Ok(Some(state))
    }

    async fn save_state(&self, mapping: &str, state: &StoredState) -> Result<()> {
        let object = self.object_for(mapping);
        let body = serde_json::to_vec_pretty(state)?;
        let mut media = Media::new(object.clone());
        media.content_type = "application/json".into();
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };
        self.client
            .upload_object(&request, body, &UploadType::Simple(media))
            .await
            .with_context(|| format!("Failed to write gs://{}/{object}", self.bucket))?;
        tracing::debug!("Stored state for '{}' to gs://{}/{}", mapping, self.bucket, object);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_cloud_storage::http::error::ErrorResponse;

    #[test]
    fn test_object_names() {
        assert_eq!(object_name("", "users"), "users.json");
        assert_eq!(
            object_name(&normalize_prefix("/etl/state"), "orders"),
            "etl/state/orders.json"
        );
    }

    #[test]
    fn test_only_missing_objects_count_as_absent() {
        let response = |code| {
            GcsError::Response(ErrorResponse {
                code,
                errors: Vec::new(),
                message: String::new(),
            })
        };
        assert!(is_not_found(&response(404)));
        assert!(!is_not_found(&response(403)));
        assert!(!is_not_found(&response(500)));
    }
}
