//! [`SourceReader`] over a mysql_async connection pool.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Params, Pool, Row, Value};
use mysql_types::mysql_value_to_universal;
use sync_core::{ColumnDefinition, TableDefinition, UniversalRow};
use sync_engine::{PageRequest, Result, SourceReader, SyncError};
use tracing::debug;

use crate::client::new_mysql_pool;
use crate::error::classify_mysql_error;
use crate::query::build_page_query;
use crate::schema;

pub struct MySqlSource {
    pool: Pool,
}

impl MySqlSource {
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        Ok(Self::from_pool(new_mysql_pool(uri)?))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Close every pooled connection.
    pub async fn disconnect(self) -> anyhow::Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to disconnect MySQL pool: {e}"))
    }
}

#[async_trait]
impl SourceReader for MySqlSource {
    async fn table_schema(&self, table: &str) -> Result<TableDefinition> {
        let mut conn = self.pool.get_conn().await.map_err(classify_mysql_error)?;
        schema::table_schema(&mut conn, table).await
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<UniversalRow>> {
        let (sql, params) = build_page_query(request);
        debug!(table = %request.table, params = params.len(), "{sql}");

        let params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params)
        };

        let mut conn = self.pool.get_conn().await.map_err(classify_mysql_error)?;
        let rows: Vec<Row> = conn
            .exec(sql, params)
            .await
            .map_err(classify_mysql_error)?;

        rows.into_iter()
            .map(|row| convert_row(row, &request.columns))
            .collect()
    }
}

/// Convert a result row whose columns are `columns`, in order.
fn convert_row(mut row: Row, columns: &[ColumnDefinition]) -> Result<UniversalRow> {
    let mut converted = UniversalRow::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value: Value = row.take(i).ok_or_else(|| {
            SyncError::failed(format!("Column {} missing from result row", column.name))
        })?;
        let value = mysql_value_to_universal(value, &column.column_type).map_err(|e| {
            SyncError::failed(format!("Failed to convert column {}: {e}", column.name))
        })?;
        converted.set(column.name.clone(), value);
    }
    Ok(converted)
}
