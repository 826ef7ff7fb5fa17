//! [`WarehouseSink`] for BigQuery.

use async_trait::async_trait;
use std::str::FromStr;
use sync_core::{UniversalRow, WarehouseColumn, WarehouseType};
use sync_engine::{Result, SyncError, WarehouseSink};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BigQueryConfig;
use crate::runner::{BigQueryClient, QueryRunner};
use crate::sql::Dataset;

/// Longest statement BigQuery accepts.
pub const MAX_QUERY_BYTES: usize = 1024 * 1024;

pub struct BigQuerySink<R = BigQueryClient> {
    runner: R,
    dataset: Dataset,
    location: Option<String>,
    max_rows_per_insert: usize,
}

impl BigQuerySink<BigQueryClient> {
    pub async fn connect(config: &BigQueryConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let runner = BigQueryClient::connect(config).await?;
        Ok(Self::with_runner(runner, config))
    }
}

impl<R: QueryRunner> BigQuerySink<R> {
    pub fn with_runner(runner: R, config: &BigQueryConfig) -> Self {
        Self {
            runner,
            dataset: Dataset::new(&config.project_id, &config.dataset_id),
            location: config.location.clone(),
            max_rows_per_insert: config.max_rows_per_insert,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Create the destination dataset if it doesn't exist.
    pub async fn ensure_dataset(&self) -> Result<()> {
        self.execute(self.dataset.create_schema(self.location.as_deref()))
            .await?;
        info!("Dataset {} is ready", self.dataset.path());
        Ok(())
    }

    async fn execute(&self, sql: String) -> Result<()> {
        debug!("{sql}");
        self.runner.query(&sql, &[]).await.map(|_| ())
    }
}

/// BigQuery `requestId` for one write into or out of a staging table.
///
/// Staging names carry the run id, so the id is the same for every retry of
/// a write and differs between runs.
pub fn request_id(dataset: &Dataset, staging: &str, step: &str) -> String {
    let name = format!("{}/{staging}/{step}", dataset.path());
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

fn parse_column(table: &str, row: &[Option<String>]) -> Result<WarehouseColumn> {
    let field = |i: usize, what: &str| {
        row.get(i).cloned().flatten().ok_or_else(|| {
            SyncError::failed(format!("Missing {what} in column listing of {table}"))
        })
    };
    let name = field(0, "column_name")?;
    let data_type = field(1, "data_type")?;
    let is_nullable = field(2, "is_nullable")?;

    let data_type = WarehouseType::from_str(&data_type).map_err(|e| {
        SyncError::SchemaIncompatible(format!(
            "Destination column {table}.{name} has an unsupported type: {e}"
        ))
    })?;
    Ok(WarehouseColumn {
        name,
        data_type,
        nullable: is_nullable.eq_ignore_ascii_case("YES"),
    })
}

#[async_trait]
impl<R: QueryRunner> WarehouseSink for BigQuerySink<R> {
    async fn table_schema(&self, table: &str) -> Result<Option<Vec<WarehouseColumn>>> {
        let rows = self
            .runner
            .query(
                &self.dataset.columns_query(table),
                &["column_name", "data_type", "is_nullable"],
            )
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        rows.iter()
            .map(|row| parse_column(table, row))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn create_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        info!("Creating table {}", self.dataset.table_path(table));
        self.execute(self.dataset.create_table(table, columns)).await
    }

    async fn add_columns(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }
        self.execute(self.dataset.add_columns(table, columns)).await
    }

    async fn create_staging_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        self.execute(self.dataset.create_staging(table, columns))
            .await
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[WarehouseColumn],
        rows: &[UniversalRow],
        first_row: u64,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let sql = self.dataset.insert_values(table, columns, rows);
        if sql.len() > MAX_QUERY_BYTES {
            return Err(SyncError::failed(format!(
                "INSERT of {} rows into {table} is {} bytes, over the {MAX_QUERY_BYTES} byte \
                 statement limit; lower destination.max_rows_per_insert",
                rows.len(),
                sql.len()
            )));
        }
        // Row literals are not logged.
        debug!(table, first_row, rows = rows.len(), bytes = sql.len(), "Inserting rows");
        let id = request_id(&self.dataset, table, &format!("rows-{first_row}"));
        self.runner.execute_once(&sql, &id).await
    }

    async fn insert_from_staging(
        &self,
        staging: &str,
        target: &str,
        columns: &[String],
    ) -> Result<()> {
        let sql = self.dataset.insert_select(staging, target, columns);
        debug!("{sql}");
        let id = request_id(&self.dataset, staging, &format!("insert-into-{target}"));
        self.runner.execute_once(&sql, &id).await
    }

    async fn merge_from_staging(
        &self,
        staging: &str,
        target: &str,
        keys: &[String],
        columns: &[String],
    ) -> Result<()> {
        let sql = self.dataset.merge(staging, target, keys, columns);
        debug!("{sql}");
        let id = request_id(&self.dataset, staging, &format!("merge-into-{target}"));
        self.runner.execute_once(&sql, &id).await
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(self.dataset.drop_table(table)).await
    }

    fn max_rows_per_insert(&self) -> usize {
        self.max_rows_per_insert
    }
}
