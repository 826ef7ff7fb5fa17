//! Table introspection through INFORMATION_SCHEMA.

use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use mysql_types::mysql_column_to_universal_type;
use sync_core::{ColumnDefinition, TableDefinition};
use sync_engine::{Result, SyncError};

use crate::error::classify_mysql_error;

const COLUMNS_QUERY: &str = "
    SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, IS_NULLABLE, NUMERIC_PRECISION, NUMERIC_SCALE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "
    SELECT COLUMN_NAME
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE CONSTRAINT_NAME = 'PRIMARY'
        AND TABLE_SCHEMA = DATABASE()
        AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

/// Columns (in ordinal order) and primary key of a table in the connection's
/// current database.
pub async fn table_schema(conn: &mut Conn, table: &str) -> Result<TableDefinition> {
    let column_rows: Vec<Row> = conn
        .exec(COLUMNS_QUERY, (table,))
        .await
        .map_err(classify_mysql_error)?;

    if column_rows.is_empty() {
        return Err(SyncError::configuration(format!(
            "Source table '{table}' does not exist or has no visible columns"
        )));
    }

    let mut columns = Vec::with_capacity(column_rows.len());
    for row in column_rows {
        columns.push(column_from_row(&row)?);
    }

    let pk_rows: Vec<Row> = conn
        .exec(PRIMARY_KEY_QUERY, (table,))
        .await
        .map_err(classify_mysql_error)?;
    let mut primary_key = Vec::with_capacity(pk_rows.len());
    for row in pk_rows {
        let name: String = row
            .get(0)
            .ok_or_else(|| SyncError::failed("Missing column name in PK query"))?;
        primary_key.push(name);
    }

    Ok(TableDefinition {
        name: table.to_string(),
        columns,
        primary_key,
    })
}

fn column_from_row(row: &Row) -> Result<ColumnDefinition> {
    let name: String = row
        .get(0)
        .ok_or_else(|| SyncError::failed("Missing column name"))?;
    let data_type: String = row
        .get(1)
        .ok_or_else(|| SyncError::failed(format!("Missing data type for column {name}")))?;
    let column_type: String = row
        .get(2)
        .ok_or_else(|| SyncError::failed(format!("Missing column type for column {name}")))?;
    let is_nullable: String = row
        .get(3)
        .ok_or_else(|| SyncError::failed(format!("Missing IS_NULLABLE for column {name}")))?;
    let precision: Option<u32> = row.get::<Option<u32>, _>(4).unwrap_or(None);
    let scale: Option<u32> = row.get::<Option<u32>, _>(5).unwrap_or(None);

    Ok(column_definition(
        name,
        &data_type,
        &column_type,
        &is_nullable,
        precision,
        scale,
    ))
}

fn column_definition(
    name: String,
    data_type: &str,
    column_type: &str,
    is_nullable: &str,
    precision: Option<u32>,
    scale: Option<u32>,
) -> ColumnDefinition {
    let column_type = mysql_column_to_universal_type(data_type, column_type, precision, scale);
    if is_nullable.eq_ignore_ascii_case("YES") {
        ColumnDefinition::nullable(name, column_type)
    } else {
        ColumnDefinition::new(name, column_type)
    }
}
