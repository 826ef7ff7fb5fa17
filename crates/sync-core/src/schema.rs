//! Table schemas on both sides of a sync.
//!
//! - `ColumnDefinition` / `TableDefinition` - source table metadata from introspection
//! - `WarehouseColumn` - destination column metadata

use crate::types::{UniversalType, WarehouseType};
use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Table not found in the source
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found in table schema
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Column exists but its type cannot be used the way it was requested
    #[error("Column '{column}' in table '{table}' has unsupported type {column_type}: {reason}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        column_type: UniversalType,
        reason: String,
    },
}

// ============================================================================
// Source schema
// ============================================================================

/// A single source column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: UniversalType,

    /// Whether this column is nullable
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnDefinition {
    /// Create a new non-nullable column definition.
    pub fn new(name: impl Into<String>, column_type: UniversalType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Create a new nullable column definition.
    pub fn nullable(name: impl Into<String>, column_type: UniversalType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

/// Source table: ordered columns plus the discovered primary key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_type(&self, name: &str) -> Option<&UniversalType> {
        self.get_column(name).map(|c| &c.column_type)
    }

    /// Like [`get_column`](Self::get_column) but reports which table was searched.
    pub fn require_column(&self, name: &str) -> Result<&ColumnDefinition, SchemaError> {
        self.get_column(name)
            .ok_or_else(|| SchemaError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

// ============================================================================
// Warehouse schema
// ============================================================================

/// A destination column as reported by, or created in, the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarehouseColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: WarehouseType,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

impl WarehouseColumn {
    /// Columns are created nullable so older rows stay valid after additions.
    pub fn new(name: impl Into<String>, data_type: WarehouseType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_definition_lookup() {
        let table = TableDefinition::new(
            "orders",
            vec![
                ColumnDefinition::new("id", UniversalType::Int64),
                ColumnDefinition::nullable("note", UniversalType::Text),
            ],
        )
        .with_primary_key(&["id"]);

        assert_eq!(table.get_column_type("id"), Some(&UniversalType::Int64));
        assert!(table.get_column("note").unwrap().nullable);
        assert_eq!(table.primary_key, vec!["id".to_string()]);
        assert_eq!(table.column_names(), vec!["id", "note"]);

        let err = table.require_column("missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Column 'missing' not found in table 'orders'"
        );
    }
}
