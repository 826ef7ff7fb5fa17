//! Schema reconciliation between a source table and its destination table.
//!
//! Pure comparison, no I/O. Creating columns is the loader's job.

use std::collections::HashMap;
use std::fmt;
use sync_core::{TableDefinition, UniversalType, WarehouseColumn, WarehouseType};

use crate::error::SyncError;

/// A destination column whose type cannot hold the source column's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub column: String,
    pub source_type: UniversalType,
    /// The type the source column would load as
    pub expected: WarehouseType,
    /// The type the destination declares
    pub actual: WarehouseType,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' is {} in the source (loads as {}) but {} in the destination",
            self.column, self.source_type, self.expected, self.actual
        )
    }
}

/// Result of comparing source and destination columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDiff {
    /// Source columns absent from the destination, with their inferred type
    pub missing_in_destination: Vec<WarehouseColumn>,
    pub type_mismatches: Vec<TypeMismatch>,
    pub compatible: bool,
    /// Whether the loader must add `missing_in_destination` before staging
    pub create_missing: bool,
    /// Every column that will be loaded, in source order, with the type its
    /// values are coerced to
    pub load_columns: Vec<WarehouseColumn>,
}

impl SchemaDiff {
    /// Source columns that exist nowhere in the destination and will not be
    /// created. They are dropped from every row.
    pub fn dropped_columns(&self) -> Vec<&str> {
        if self.create_missing {
            return Vec::new();
        }
        self.missing_in_destination
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn target_type(&self, column: &str) -> Option<WarehouseType> {
        self.load_columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.data_type)
    }

    pub fn load_column_names(&self) -> Vec<String> {
        self.load_columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Fails with `SchemaIncompatible` listing every mismatch.
    pub fn ensure_compatible(&self, mapping: &str) -> Result<(), SyncError> {
        if self.compatible {
            return Ok(());
        }
        let details: Vec<String> = self.type_mismatches.iter().map(|m| m.to_string()).collect();
        Err(SyncError::SchemaIncompatible(format!(
            "mapping '{}': {}",
            mapping,
            details.join("; ")
        )))
    }
}

/// Compare a source table with the destination's columns.
///
/// Column names match case-insensitively, as in the warehouse. A destination
/// column is compatible when its type equals the inferred type or is a
/// lossless widening of it. Destination-only columns are left alone.
pub fn reconcile(
    source: &TableDefinition,
    destination: &[WarehouseColumn],
    allow_auto_add: bool,
) -> SchemaDiff {
    let dest_types: HashMap<String, WarehouseType> = destination
        .iter()
        .map(|c| (c.name.to_lowercase(), c.data_type))
        .collect();

    let mut missing_in_destination = Vec::new();
    let mut type_mismatches = Vec::new();
    let mut present = Vec::new();

    for column in &source.columns {
        let expected = column.column_type.warehouse_type();
        match dest_types.get(&column.name.to_lowercase()) {
            None => missing_in_destination.push(WarehouseColumn::new(&column.name, expected)),
            Some(actual) if column.column_type.fits_in(*actual) => {
                present.push(WarehouseColumn::new(&column.name, *actual));
            }
            Some(actual) => type_mismatches.push(TypeMismatch {
                column: column.name.clone(),
                source_type: column.column_type.clone(),
                expected,
                actual: *actual,
            }),
        }
    }

    let compatible = type_mismatches.is_empty();
    let create_missing = allow_auto_add && compatible && !missing_in_destination.is_empty();

    // Keep source column order in the load list.
    let load_columns = source
        .columns
        .iter()
        .filter_map(|column| {
            present
                .iter()
                .find(|c| c.name == column.name)
                .or_else(|| {
                    create_missing
                        .then(|| missing_in_destination.iter().find(|c| c.name == column.name))
                        .flatten()
                })
                .cloned()
        })
        .collect();

    SchemaDiff {
        missing_in_destination,
        type_mismatches,
        compatible,
        create_missing,
        load_columns,
    }
}
