//! Run report written after every run.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use sync_engine::RunResult;

pub const REPORT_FILE: &str = "report.json";

/// Write `results` as a pretty JSON array to `{dir}/report.json`, replacing
/// the previous report. Object keys are sorted.
pub fn write_report(results: &[RunResult], dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(REPORT_FILE);

    let value = sort_keys(serde_json::to_value(results).context("Failed to serialize report")?);
    let json = serde_json::to_string_pretty(&value).context("Failed to serialize report")?;
    std::fs::write(&path, json + "\n")
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sync_engine::{RunKind, RunStatus, SyncMode};

    fn result(name: &str, status: RunStatus) -> RunResult {
        let now = Utc::now();
        RunResult {
            mapping_name: name.to_string(),
            run_id: "abc123".to_string(),
            mode: SyncMode::Append,
            kind: RunKind::Incremental,
            status,
            rows_extracted: 3,
            rows_loaded: 3,
            previous_watermark: None,
            new_watermark: None,
            error: None,
            error_kind: None,
            failed_phase: None,
            final_state: "done".to_string(),
            warnings: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_seconds: 0.5,
        }
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("reports");
        let path = write_report(
            &[
                result("users", RunStatus::Success),
                result("orders", RunStatus::Failed),
            ],
            &nested,
        )
        .unwrap();
        assert_eq!(path, nested.join("report.json"));

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        let runs = parsed.as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["mapping_name"], "users");
        assert_eq!(runs[1]["status"], "failed");

        // Keys appear in sorted order in the file.
        let duration = text.find("\"duration_seconds\"").unwrap();
        let mapping = text.find("\"mapping_name\"").unwrap();
        let warnings = text.find("\"warnings\"").unwrap();
        assert!(duration < mapping && mapping < warnings);
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        assert!(write_report(&[], &blocker.join("sub")).is_err());
    }
}
