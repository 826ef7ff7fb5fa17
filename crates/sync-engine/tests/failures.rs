//! Integration tests for failure handling: retries, isolation between
//! mappings, staging cleanup and the watermark never moving on failure.

mod common;

use anyhow::Result;
use checkpoint::WatermarkStore;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{WarehouseColumn, WarehouseType, WatermarkValue};
use sync_engine::testing::{FailingStore, FaultKind, MemorySource, MemoryWarehouse, WarehouseOp};
use sync_engine::{Mapping, Phase, RetryPolicy, RunStatus, SyncEngine, SyncMode};
use tokio_util::sync::CancellationToken;

async fn seeded_users(h: &Harness) {
    h.source
        .add_table(
            users_table(),
            vec![
                user(1, "a@example.com", "2024-01-01 10:00:00"),
                user(2, "b@example.com", "2024-01-01 10:05:00"),
            ],
        )
        .await;
}

#[tokio::test]
async fn test_one_failing_mapping_does_not_stop_others() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    let mut broken = users_mapping(SyncMode::Append);
    broken.name = "ghost".to_string();
    broken.source_table = "no_such_table".to_string();
    broken.destination_table = "ghost".to_string();

    let results = h
        .engine
        .run_once(&[broken, users_mapping(SyncMode::Upsert)])
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].mapping_name, "ghost");
    assert_eq!(results[0].status, RunStatus::Failed);
    assert_eq!(results[0].error_kind.as_deref(), Some("configuration"));
    assert_eq!(results[0].failed_phase, Some(Phase::Reconciling));
    assert_eq!(results[1].status, RunStatus::Success);
    assert_eq!(h.warehouse.rows("users").await.len(), 2);
    assert!(sync_engine::any_failed(&results));
    Ok(())
}

#[tokio::test]
async fn test_merge_failure_keeps_watermark_and_drops_staging() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.warehouse
        .fail_next(WarehouseOp::Merge, 1, FaultKind::Fatal)
        .await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Upsert)]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed_phase, Some(Phase::Loading));
    assert_eq!(result.final_state, "failed");
    assert_eq!(result.new_watermark, None);
    assert_eq!(h.watermark("users").await, None);
    assert!(h.warehouse.rows("users").await.is_empty());
    assert!(h.leftover_staging().await.is_empty());
    assert_eq!(h.warehouse.op_count(WarehouseOp::DropTable).await, 1);

    // The next run picks up the same rows.
    let retry = &h.engine.run_once(&[users_mapping(SyncMode::Upsert)]).await[0];
    assert_eq!(retry.status, RunStatus::Success);
    assert_eq!(h.warehouse.rows("users").await.len(), 2);
    assert_eq!(h.watermark("users").await, Some(ts("2024-01-01 10:05:00")));
    Ok(())
}

#[tokio::test]
async fn test_transient_errors_are_retried() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.source.fail_next_schema_reads(1, FaultKind::Transient).await;
    h.source.fail_next_fetches(2, FaultKind::Transient).await;
    h.warehouse
        .fail_next(WarehouseOp::InsertFromStaging, 2, FaultKind::Transient)
        .await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Success, "{:?}", result.error);
    assert_eq!(h.source.schema_read_count(), 2);
    assert_eq!(h.source.fetch_count(), 3);
    assert_eq!(h.warehouse.op_count(WarehouseOp::InsertFromStaging).await, 3);
    assert_eq!(h.warehouse.rows("users").await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_retry_exhaustion_fails_mapping() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.source.fail_next_fetches(10, FaultKind::Transient).await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("run_failed"));
    assert_eq!(result.failed_phase, Some(Phase::Extracting));
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("after 3 attempts")));
    assert_eq!(h.source.fetch_count(), 3);
    assert_eq!(h.watermark("users").await, None);
    Ok(())
}

#[tokio::test]
async fn test_fatal_source_error_is_not_retried() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.source.fail_next_fetches(1, FaultKind::Fatal).await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(h.source.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_state_store_write_failure_fails_mapping() -> Result<()> {
    init_logging();
    let source = Arc::new(MemorySource::new());
    let warehouse = Arc::new(MemoryWarehouse::new());
    let store = Arc::new(FailingStore::new());
    let dyn_store: Arc<dyn WatermarkStore> = store.clone();
    let engine = SyncEngine::new(source.clone(), warehouse.clone(), dyn_store, settings(100));
    source
        .add_table(
            users_table(),
            vec![user(1, "a@example.com", "2024-01-01 10:00:00")],
        )
        .await;
    let mappings = vec![users_mapping(SyncMode::Upsert)];

    store.fail_writes(true);
    let result = &engine.run_once(&mappings).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed_phase, Some(Phase::Committing));
    assert_eq!(result.new_watermark, None);
    assert!(store.inner().get_watermark("users").await?.is_none());

    // Loaded but uncommitted rows are reloaded; the merge keeps one copy.
    store.fail_writes(false);
    let result = &engine.run_once(&mappings).await[0];
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.rows_extracted, 1);
    assert_eq!(warehouse.rows("users").await.len(), 1);
    assert_eq!(
        store.inner().get_watermark("users").await?.map(|w| w.value),
        Some(ts("2024-01-01 10:00:00"))
    );
    Ok(())
}

#[tokio::test]
async fn test_schema_mismatch_is_fatal_before_any_write() -> Result<()> {
    init_logging();
    let warehouse = MemoryWarehouse::new();
    warehouse
        .create_table_with(
            "users",
            vec![
                WarehouseColumn::new("id", WarehouseType::Int64),
                WarehouseColumn::new("email", WarehouseType::Int64),
                WarehouseColumn::new("updated_at", WarehouseType::Timestamp),
            ],
        )
        .await;
    let h = Harness::with_warehouse(warehouse, settings(100));
    seeded_users(&h).await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("schema_incompatible"));
    assert_eq!(result.failed_phase, Some(Phase::Reconciling));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("email")));
    assert_eq!(h.source.fetch_count(), 0);
    assert_eq!(h.warehouse.op_count(WarehouseOp::CreateStaging).await, 0);
    assert!(h.warehouse.rows("users").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_configuration_error_performs_no_io() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    let mut mapping = users_mapping(SyncMode::Upsert);
    mapping.primary_keys.clear();

    let result = &h.engine.run_once(&[mapping]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("configuration"));
    assert_eq!(result.failed_phase, Some(Phase::Pending));
    assert_eq!(h.source.schema_read_count(), 0);
    assert_eq!(h.source.fetch_count(), 0);
    assert!(h.warehouse.ops().await.is_empty());
    assert!(h.store.mappings().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stored_watermark_of_wrong_kind_is_rejected() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.store
        .set_watermark("users", WatermarkValue::Integer(42))
        .await?;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("configuration"));
    assert_eq!(h.source.fetch_count(), 0);
    assert_eq!(h.watermark("users").await, Some(WatermarkValue::Integer(42)));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_skips_unstarted_mappings() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.engine.cancellation_token().cancel();

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(h.source.schema_read_count(), 0);
    assert!(h.warehouse.ops().await.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_interrupts_backoff_without_advancing_watermark() -> Result<()> {
    init_logging();
    let slow_retry = RetryPolicy::new()
        .with_max_attempts(10)
        .with_base_delay(Duration::from_secs(60))
        .with_max_delay(Duration::from_secs(600))
        .with_jitter(0.0);
    let cancel = CancellationToken::new();
    let mut engine_settings = settings(100);
    engine_settings.retry = slow_retry;
    let h = Harness::new(engine_settings);
    seeded_users(&h).await;
    h.source.fail_next_fetches(100, FaultKind::Transient).await;

    let engine = SyncEngine::new(
        h.source.clone(),
        h.warehouse.clone(),
        h.store.clone(),
        h.engine.settings().clone(),
    )
    .with_cancellation(cancel.clone());

    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        timer.cancel();
    });

    let started = tokio::time::Instant::now();
    let mappings: Vec<Mapping> = vec![users_mapping(SyncMode::Append)];
    let result = &engine.run_once(&mappings).await[0];
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("cancelled"));
    assert_eq!(result.failed_phase, Some(Phase::Extracting));
    assert_eq!(h.source.fetch_count(), 1);
    assert_eq!(h.watermark("users").await, None);
    Ok(())
}

#[tokio::test]
async fn test_writes_applied_before_a_timeout_are_not_duplicated() -> Result<()> {
    init_logging();
    let h = Harness::new(settings(100));
    seeded_users(&h).await;
    h.warehouse
        .fail_next(WarehouseOp::InsertRows, 1, FaultKind::Ambiguous)
        .await;
    h.warehouse
        .fail_next(WarehouseOp::InsertFromStaging, 1, FaultKind::Ambiguous)
        .await;

    let result = &h.engine.run_once(&[users_mapping(SyncMode::Append)]).await[0];
    assert_eq!(result.status, RunStatus::Success, "{:?}", result.error);
    assert_eq!(h.warehouse.op_count(WarehouseOp::InsertRows).await, 2);
    assert_eq!(h.warehouse.op_count(WarehouseOp::InsertFromStaging).await, 2);
    assert_eq!(result.rows_loaded, 2);
    assert_eq!(h.warehouse.rows("users").await.len(), 2);
    Ok(())
}
