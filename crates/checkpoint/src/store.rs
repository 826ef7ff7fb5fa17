//! Watermark storage trait and types
//!
//! Each mapping owns one state document holding its committed watermark and
//! the metadata of its most recent run. Backends only need to read and write
//! whole documents; the watermark operations are built on top.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_core::WatermarkValue;

/// A committed watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub value: WatermarkValue,
    /// When the watermark was committed
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a mapping's last run, kept for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failed,
    Skipped,
}

/// Metadata describing the most recent run of a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub rows_loaded: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-mapping state document as persisted by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunMetadata>,
}

/// Trait for watermark storage operations.
///
/// Implemented by:
/// - `FilesystemStore` - one JSON file per mapping
/// - `S3Store` - one JSON object per mapping
/// - `MemoryStore` - process-local, for tests and dry runs
///
/// Writes must be atomic per document: a reader sees either the previous
/// or the new document, never a partial one.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read the state document of a mapping. Returns None if it doesn't exist.
    async fn load_state(&self, mapping: &str) -> Result<Option<StoredState>>;

    /// Replace the state document of a mapping.
    async fn save_state(&self, mapping: &str, state: &StoredState) -> Result<()>;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String;

    /// The committed watermark of a mapping, if any.
    async fn get_watermark(&self, mapping: &str) -> Result<Option<Watermark>> {
        Ok(self.load_state(mapping).await?.and_then(|s| s.watermark))
    }

    /// Commit a new watermark. This is the sole commit point of a run.
    async fn set_watermark(&self, mapping: &str, value: WatermarkValue) -> Result<Watermark> {
        let mut state = self.load_state(mapping).await?.unwrap_or_default();
        let watermark = Watermark {
            value,
            updated_at: Utc::now(),
        };
        state.watermark = Some(watermark.clone());
        self.save_state(mapping, &state).await?;
        tracing::info!(
            "Committed watermark {} for mapping '{}' to {}",
            value,
            mapping,
            self.describe()
        );
        Ok(watermark)
    }

    async fn get_last_run_metadata(&self, mapping: &str) -> Result<Option<RunMetadata>> {
        Ok(self.load_state(mapping).await?.and_then(|s| s.last_run))
    }

    /// Record the outcome of a run without touching the watermark.
    async fn record_run(&self, mapping: &str, metadata: &RunMetadata) -> Result<()> {
        let mut state = self.load_state(mapping).await?.unwrap_or_default();
        state.last_run = Some(metadata.clone());
        self.save_state(mapping, &state).await
    }
}
