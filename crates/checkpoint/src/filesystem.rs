//! Filesystem-based watermark storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::store::{StoredState, WatermarkStore};

/// Filesystem implementation of WatermarkStore trait.
///
/// Stores one `{mapping}.json` document per mapping in a directory. Writes go
/// to a temporary file in the same directory which is then renamed over the
/// target, so a crash never leaves a truncated document behind.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, mapping: &str) -> PathBuf {
        self.dir.join(format!("{mapping}.json"))
    }
}

#[async_trait]
impl WatermarkStore for FilesystemStore {
    async fn load_state(&self, mapping: &str) -> Result<Option<StoredState>> {
        let path = self.path_for(mapping);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt state document {}", path.display()))?;
        Ok(Some(state))
    }

    async fn save_state(&self, mapping: &str, state: &StoredState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create state dir {}", self.dir.display()))?;

        let path = self.path_for(mapping);
        let tmp = self
            .dir
            .join(format!(".{mapping}.json.{}.tmp", uuid::Uuid::new_v4().simple()));

        let body = serde_json::to_vec_pretty(state)?;
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
        }
        tracing::debug!("Stored state for '{}' to {}", mapping, path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}
