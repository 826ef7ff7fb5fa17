//! Warehouse sink trait.

use async_trait::async_trait;
use sync_core::{UniversalRow, WarehouseColumn};

use crate::error::Result;

/// Trait for writing to the analytical warehouse.
///
/// The engine never writes to a destination table row by row: rows go to a
/// per-run staging table, then a single set-based statement moves them into
/// the destination. Each method is expected to be atomic on its own; the
/// engine provides retries, so implementations should map quota, rate
/// limit and connectivity failures to `SyncError::TransientIo`.
///
/// A transient error does not prove the write was not applied. The writes
/// (`insert_rows`, `insert_from_staging`, `merge_from_staging`) must
/// therefore be idempotent: a repeated call with the same arguments inside
/// one run must not apply the rows a second time.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Columns of a table, or None if the table does not exist.
    async fn table_schema(&self, table: &str) -> Result<Option<Vec<WarehouseColumn>>>;

    /// Create a destination table. Succeeds if it already exists.
    async fn create_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()>;

    /// Add nullable columns to an existing table.
    async fn add_columns(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()>;

    /// Create an empty staging table, replacing any leftover of the same name.
    async fn create_staging_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()>;

    /// Insert rows into a staging table. Each call is all-or-nothing.
    /// `first_row` is the position of `rows[0]` among all rows staged into
    /// `table`; together they identify the chunk across retries.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[WarehouseColumn],
        rows: &[UniversalRow],
        first_row: u64,
    ) -> Result<()>;

    /// `INSERT INTO target (columns) SELECT columns FROM staging`
    async fn insert_from_staging(&self, staging: &str, target: &str, columns: &[String])
        -> Result<()>;

    /// Set-based merge on `keys`: matched target rows get every non-key
    /// column from staging, unmatched staging rows are inserted.
    async fn merge_from_staging(
        &self,
        staging: &str,
        target: &str,
        keys: &[String],
        columns: &[String],
    ) -> Result<()>;

    /// Drop a table if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Upper bound on rows per `insert_rows` call.
    fn max_rows_per_insert(&self) -> usize {
        500
    }
}
