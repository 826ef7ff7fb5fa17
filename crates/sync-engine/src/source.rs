//! Source reader trait.
//!
//! The engine only needs two things from a relational source: its table
//! schema and ordered, bounded pages of rows.

use async_trait::async_trait;
use sync_core::{ColumnDefinition, TableDefinition, UniversalRow, UniversalValue};

use crate::error::Result;
use crate::mapping::ComparisonOp;

/// Range predicate on the incremental column.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub op: ComparisonOp,
    pub value: UniversalValue,
}

/// How rows past the previous page are located.
#[derive(Debug, Clone, PartialEq)]
pub enum PageAfter {
    /// First page of the range
    Start,
    /// Keyset continuation: rows whose `(incremental, keys...)` tuple is
    /// strictly greater than this one.
    Key(Vec<UniversalValue>),
    /// Positional continuation, used only when the table has no key to
    /// break ties on.
    Offset(u64),
}

/// One page request against a source table.
///
/// Rows are selected by
/// `incremental OP lower AND incremental <= upper AND <after>`
/// ordered by `incremental ASC, order_keys ASC`, limited to `limit` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub table: String,
    /// Columns to select, in output order
    pub columns: Vec<ColumnDefinition>,
    pub incremental_column: String,
    /// Secondary sort keys that make the ordering total
    pub order_keys: Vec<String>,
    pub lower: Option<Bound>,
    /// Inclusive upper bound
    pub upper: Option<UniversalValue>,
    pub after: PageAfter,
    pub limit: usize,
}

impl PageRequest {
    /// The column names that form the keyset tuple, in comparison order.
    pub fn keyset_columns(&self) -> Vec<&str> {
        std::iter::once(self.incremental_column.as_str())
            .chain(self.order_keys.iter().map(String::as_str))
            .collect()
    }
}

/// Trait for reading from the relational source.
///
/// Implementations report connectivity and lock-contention failures as
/// `SyncError::TransientIo` so the engine can retry them.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Column names, types and nullability, plus the primary key.
    ///
    /// A table that doesn't exist is a `Configuration` error.
    async fn table_schema(&self, table: &str) -> Result<TableDefinition>;

    /// Fetch one page. Returns fewer than `limit` rows only on the last page.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<UniversalRow>>;
}
