//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use chrono::NaiveDateTime;
use checkpoint::{MemoryStore, WatermarkStore};
use std::sync::Arc;
use std::time::Duration;
use sync_core::{ColumnDefinition, TableDefinition, UniversalRow, UniversalType, UniversalValue, WatermarkValue};
use sync_engine::testing::{MemorySource, MemoryWarehouse};
use sync_engine::{
    ComparisonOp, EngineSettings, IncrementalColumn, Mapping, RetryPolicy, SyncEngine, SyncMode,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Three attempts, no waiting between them.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::ZERO)
        .with_max_delay(Duration::ZERO)
        .with_jitter(0.0)
}

pub fn settings(page_size: usize) -> EngineSettings {
    EngineSettings {
        page_size,
        retry: fast_retry(),
        ..Default::default()
    }
}

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Watermark of a naive UTC timestamp.
pub fn ts(s: &str) -> WatermarkValue {
    WatermarkValue::Timestamp(at(s).and_utc())
}

pub fn zoned(s: &str) -> UniversalValue {
    UniversalValue::ZonedDateTime(at(s).and_utc())
}

pub fn users_table() -> TableDefinition {
    TableDefinition::new(
        "users",
        vec![
            ColumnDefinition::new("id", UniversalType::Int32),
            ColumnDefinition::nullable("email", UniversalType::varchar(255)),
            ColumnDefinition::new("updated_at", UniversalType::LocalDateTime),
        ],
    )
    .with_primary_key(&["id"])
}

pub fn user(id: i32, email: &str, updated_at: &str) -> UniversalRow {
    UniversalRow::new()
        .with("id", UniversalValue::Int32(id))
        .with("email", UniversalValue::Text(email.to_string()))
        .with("updated_at", UniversalValue::LocalDateTime(at(updated_at)))
}

pub fn users_mapping(mode: SyncMode) -> Mapping {
    let mapping = Mapping::new(
        "users",
        "users",
        "users",
        mode,
        IncrementalColumn::new("updated_at", ComparisonOp::Gt),
    );
    match mode {
        SyncMode::Upsert => mapping.with_primary_keys(&["id"]),
        SyncMode::Append => mapping,
    }
}

/// The value of `column` in the destination row whose `id` is `id`.
pub fn value_for(rows: &[UniversalRow], id: i64, column: &str) -> Option<UniversalValue> {
    rows.iter()
        .find(|r| r.get("id") == Some(&UniversalValue::Int64(id)))
        .and_then(|r| r.get(column).cloned())
}

/// Engine wired to in-memory fakes, with handles kept for inspection.
pub struct Harness {
    pub source: Arc<MemorySource>,
    pub warehouse: Arc<MemoryWarehouse>,
    pub store: Arc<MemoryStore>,
    pub engine: SyncEngine<MemorySource, MemoryWarehouse>,
}

impl Harness {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_warehouse(MemoryWarehouse::new(), settings)
    }

    pub fn with_warehouse(warehouse: MemoryWarehouse, settings: EngineSettings) -> Self {
        let source = Arc::new(MemorySource::new());
        let warehouse = Arc::new(warehouse);
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn WatermarkStore> = store.clone();
        let engine = SyncEngine::new(source.clone(), warehouse.clone(), dyn_store, settings);
        Self {
            source,
            warehouse,
            store,
            engine,
        }
    }

    pub async fn watermark(&self, mapping: &str) -> Option<WatermarkValue> {
        self.store
            .get_watermark(mapping)
            .await
            .unwrap()
            .map(|w| w.value)
    }

    /// Staging tables that were left behind.
    pub async fn leftover_staging(&self) -> Vec<String> {
        self.warehouse
            .table_names()
            .await
            .into_iter()
            .filter(|t| t.contains("_staging_"))
            .collect()
    }
}
