//! Unit tests for the checkpoint crate.

use chrono::{TimeZone, Utc};
use sync_core::WatermarkValue;
use tempfile::TempDir;

use crate::{
    FilesystemStore, MemoryStore, RunMetadata, RunOutcome, StateStorage, WatermarkStore,
};

fn ts(h: u32) -> WatermarkValue {
    WatermarkValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap())
}

fn run_metadata(outcome: RunOutcome) -> RunMetadata {
    RunMetadata {
        run_id: "r1".to_string(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        outcome,
        rows_loaded: 3,
        error: None,
    }
}

// ============================================================================
// FilesystemStore Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_missing_mapping_has_no_watermark() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(temp_dir.path().join("does-not-exist-yet"));

    assert!(store.get_watermark("orders").await.unwrap().is_none());
    assert!(store.get_last_run_metadata("orders").await.unwrap().is_none());
}

#[tokio::test]
async fn test_filesystem_watermark_persists_across_instances() {
    let temp_dir = TempDir::new().unwrap();

    let store = FilesystemStore::new(temp_dir.path());
    store.set_watermark("orders", ts(10)).await.unwrap();
    store.set_watermark("orders", ts(12)).await.unwrap();

    let reopened = FilesystemStore::new(temp_dir.path());
    let wm = reopened.get_watermark("orders").await.unwrap().unwrap();
    assert_eq!(wm.value, ts(12));
    assert!(temp_dir.path().join("orders.json").exists());
}

#[tokio::test]
async fn test_filesystem_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(temp_dir.path());
    store.set_watermark("a", ts(1)).await.unwrap();
    store.set_watermark("b", WatermarkValue::Integer(7)).await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.json", "b.json"]);
}

#[tokio::test]
async fn test_filesystem_mappings_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(temp_dir.path());

    store.set_watermark("orders", ts(10)).await.unwrap();
    store.set_watermark("customers", ts(3)).await.unwrap();

    assert_eq!(
        store.get_watermark("orders").await.unwrap().unwrap().value,
        ts(10)
    );
    assert_eq!(
        store.get_watermark("customers").await.unwrap().unwrap().value,
        ts(3)
    );
}

#[tokio::test]
async fn test_record_run_keeps_watermark() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(temp_dir.path());

    store.set_watermark("orders", ts(10)).await.unwrap();
    let mut failed = run_metadata(RunOutcome::Failed);
    failed.error = Some("boom".to_string());
    store.record_run("orders", &failed).await.unwrap();

    assert_eq!(
        store.get_watermark("orders").await.unwrap().unwrap().value,
        ts(10)
    );
    let last = store.get_last_run_metadata("orders").await.unwrap().unwrap();
    assert_eq!(last.outcome, RunOutcome::Failed);
    assert_eq!(last.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_filesystem_corrupt_document_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("orders.json"), "{not json").unwrap();
    let store = FilesystemStore::new(temp_dir.path());

    let err = store.get_watermark("orders").await.unwrap_err();
    assert!(format!("{err:#}").contains("Corrupt state document"));
}

// ============================================================================
// MemoryStore / config Tests
// ============================================================================

#[tokio::test]
async fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    assert!(store.get_watermark("x").await.unwrap().is_none());

    store
        .set_watermark("x", WatermarkValue::Integer(5))
        .await
        .unwrap();
    store
        .record_run("y", &run_metadata(RunOutcome::Success))
        .await
        .unwrap();

    assert_eq!(
        store.get_watermark("x").await.unwrap().unwrap().value,
        WatermarkValue::Integer(5)
    );
    assert!(store.get_watermark("y").await.unwrap().is_none());
    assert_eq!(store.mappings().await, vec!["x", "y"]);
}

#[test]
fn test_state_storage_from_json() {
    let local: StateStorage = serde_json::from_str(r#"{"store":"local","path":"/tmp/s"}"#).unwrap();
    assert_eq!(
        local,
        StateStorage::Local {
            path: "/tmp/s".to_string()
        }
    );

    let s3: StateStorage = serde_json::from_str(r#"{"store":"s3","bucket":"b"}"#).unwrap();
    assert_eq!(
        s3,
        StateStorage::S3 {
            bucket: "b".to_string(),
            prefix: String::new()
        }
    );

    let gcs: StateStorage = serde_json::from_str(
        r#"{"store":"gcs","bucket":"etl-state","prefix":"prod","credentials_file":"/sa.json"}"#,
    )
    .unwrap();
    assert_eq!(
        gcs,
        StateStorage::Gcs {
            bucket: "etl-state".to_string(),
            prefix: "prod".to_string(),
            credentials_file: Some("/sa.json".to_string())
        }
    );

    let gcs_default: StateStorage =
        serde_json::from_str(r#"{"store":"gcs","bucket":"b"}"#).unwrap();
    assert_eq!(
        gcs_default,
        StateStorage::Gcs {
            bucket: "b".to_string(),
            prefix: String::new(),
            credentials_file: None
        }
    );
}

#[tokio::test]
async fn test_state_storage_builds_local_store() {
    let temp_dir = TempDir::new().unwrap();
    let storage = StateStorage::Local {
        path: temp_dir.path().to_string_lossy().to_string(),
    };
    let store = storage.build().await.unwrap();
    store.set_watermark("m", ts(4)).await.unwrap();
    assert!(temp_dir.path().join("m.json").exists());
}
