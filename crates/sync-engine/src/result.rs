//! Per-mapping run results handed to the reporting side.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use sync_core::WatermarkValue;

use crate::mapping::SyncMode;
use crate::state::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Incremental,
    Backfill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub mapping_name: String,
    pub run_id: String,
    pub mode: SyncMode,
    pub kind: RunKind,
    pub status: RunStatus,
    pub rows_extracted: u64,
    pub rows_loaded: u64,
    pub previous_watermark: Option<WatermarkValue>,
    /// Set only when this run advanced the stored watermark
    pub new_watermark: Option<WatermarkValue>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub failed_phase: Option<Phase>,
    /// State the mapping ended in: done, failed, or pending when skipped
    pub final_state: String,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl RunResult {
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// One-line summary for logs and terminals.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} [{}] {}: extracted={} loaded={}",
            self.mapping_name, self.mode, self.status, self.rows_extracted, self.rows_loaded
        );
        if let Some(wm) = &self.new_watermark {
            line.push_str(&format!(" watermark={wm}"));
        }
        if let Some(err) = &self.error {
            line.push_str(&format!(" error={err}"));
        }
        line
    }
}

/// True if any result failed. Drives the process exit status.
pub fn any_failed(results: &[RunResult]) -> bool {
    results.iter().any(RunResult::is_failed)
}
