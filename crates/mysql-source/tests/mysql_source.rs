//! Reads against a real MySQL server. Run with `cargo test -- --ignored`.

use anyhow::Result;
use checkpoint::{MemoryStore, WatermarkStore};
use mysql_async::prelude::*;
use std::sync::Arc;
use sync_core::{UniversalType, UniversalValue};
use sync_engine::testing::MemoryWarehouse;
use sync_engine::{
    ComparisonOp, EngineSettings, IncrementalColumn, Mapping, PageAfter, PageRequest, RunStatus,
    SourceReader, SyncEngine, SyncMode,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warehouse_sync_mysql_source::testing::MySQLContainer;
use warehouse_sync_mysql_source::MySqlSource;

fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

async fn seeded_container(name: &str, port: u16) -> Result<MySQLContainer> {
    let container = MySQLContainer::new(name, port);
    container.start()?;
    container.wait_until_ready(90).await?;

    let pool = container.get_pool()?;
    let mut conn = pool.get_conn().await?;
    conn.query_drop(
        "CREATE TABLE users (
            id INT PRIMARY KEY,
            email VARCHAR(255) NULL,
            balance BIGINT UNSIGNED NOT NULL DEFAULT 0,
            updated_at DATETIME(6) NULL
        )",
    )
    .await?;
    conn.query_drop(
        "INSERT INTO users (id, email, balance, updated_at) VALUES
            (1, 'a@example.com', 18446744073709551615, '2024-01-01 10:00:00'),
            (2, 'b@example.com', 5, '2024-01-01 10:05:00'),
            (3, NULL, 7, '2024-01-01 10:05:00'),
            (4, 'never@example.com', 0, NULL)",
    )
    .await?;
    drop(conn);
    pool.disconnect().await?;
    Ok(container)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_schema_and_keyset_pages() -> Result<()> {
    init_logging();
    let container = seeded_container("warehouse-sync-mysql-pages", 33061).await?;
    let source = MySqlSource::new(&container.connection_string)?;

    let schema = source.table_schema("users").await?;
    assert_eq!(schema.primary_key, vec!["id".to_string()]);
    assert_eq!(
        schema.get_column_type("balance"),
        Some(&UniversalType::decimal(20, 0))
    );
    assert!(schema.get_column("email").is_some_and(|c| c.nullable));

    let mut request = PageRequest {
        table: "users".to_string(),
        columns: schema.columns.clone(),
        incremental_column: "updated_at".to_string(),
        order_keys: vec!["id".to_string()],
        lower: None,
        upper: None,
        after: PageAfter::Start,
        limit: 2,
    };
    let first = source.fetch_page(&request).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(
        first[0].get("balance"),
        Some(&UniversalValue::Decimal("18446744073709551615".into()))
    );

    let last = &first[1];
    request.after = PageAfter::Key(vec![
        last.get("updated_at").cloned().unwrap_or(UniversalValue::Null),
        last.get("id").cloned().unwrap_or(UniversalValue::Null),
    ]);
    let second = source.fetch_page(&request).await?;
    // Row 4 has no updated_at and is never read.
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].get("id"), Some(&UniversalValue::Int32(3)));
    assert_eq!(second[0].get("email"), Some(&UniversalValue::Null));

    let missing = source.table_schema("ghost").await;
    assert!(matches!(missing, Err(e) if e.kind() == "configuration"));

    source.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_engine_run_against_mysql() -> Result<()> {
    init_logging();
    let container = seeded_container("warehouse-sync-mysql-engine", 33062).await?;
    let source = Arc::new(MySqlSource::new(&container.connection_string)?);
    let warehouse = Arc::new(MemoryWarehouse::new());
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn WatermarkStore> = store.clone();
    let settings = EngineSettings {
        page_size: 2,
        ..Default::default()
    };
    let engine = SyncEngine::new(source, warehouse.clone(), dyn_store, settings);

    let mapping = Mapping::new(
        "users",
        "users",
        "users",
        SyncMode::Upsert,
        IncrementalColumn::new("updated_at", ComparisonOp::Gt),
    )
    .with_primary_keys(&["id"]);

    let result = &engine.run_once(&[mapping]).await[0];
    assert_eq!(result.status, RunStatus::Success, "{:?}", result.error);
    assert_eq!(result.rows_extracted, 3);
    assert_eq!(warehouse.rows("users").await.len(), 3);
    assert!(store.get_watermark("users").await?.is_some());
    Ok(())
}
