//! State storage configuration.

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;

use crate::{FilesystemStore, GcsStore, MemoryStore, S3Store, WatermarkStore};

/// Where mapping state documents live.
///
/// ```yaml
/// state:
///   store: local
///   path: ./state
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum StateStorage {
    /// One JSON file per mapping under `path`.
    Local {
        #[serde(default = "default_state_dir")]
        path: String,
    },
    /// One JSON object per mapping under `s3://bucket/prefix`.
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
    },
    /// One JSON object per mapping under `gs://bucket/prefix`.
    Gcs {
        bucket: String,
        #[serde(default)]
        prefix: String,
        /// Service account key; application default credentials otherwise
        #[serde(default)]
        credentials_file: Option<String>,
    },
    /// Process-local only.
    Memory,
}

fn default_state_dir() -> String {
    ".warehouse-sync-state".to_string()
}

impl Default for StateStorage {
    fn default() -> Self {
        Self::Local {
            path: default_state_dir(),
        }
    }
}

impl StateStorage {
    /// Build the configured store.
    pub async fn build(&self) -> Result<Arc<dyn WatermarkStore>> {
        let store: Arc<dyn WatermarkStore> = match self {
            Self::Local { path } => Arc::new(FilesystemStore::new(path)),
            Self::S3 { bucket, prefix } => Arc::new(S3Store::new(bucket, prefix).await?),
            Self::Gcs {
                bucket,
                prefix,
                credentials_file,
            } => Arc::new(GcsStore::new(bucket, prefix, credentials_file.as_deref()).await?),
            Self::Memory => Arc::new(MemoryStore::new()),
        };
        tracing::info!("Using state store at {}", store.describe());
        Ok(store)
    }
}
