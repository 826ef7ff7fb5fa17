//! Core types for the warehouse-sync framework.
//!
//! This crate provides the foundational types used across the sync
//! pipeline:
//!
//! - [`UniversalType`] - Source column types, independent of the driver
//! - [`WarehouseType`] - Destination column types
//! - [`UniversalValue`] / [`UniversalRow`] - Values and rows flowing between stages
//! - [`TableDefinition`] / [`WarehouseColumn`] - Schemas on either side
//! - [`WatermarkValue`] - The high-water mark of an incremental column
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── checkpoint      (persists WatermarkValue per mapping)
//!    ├─── mysql-types     (MySQL <-> UniversalType/UniversalValue)
//!    ├─── sync-engine     (reconcile, extract, transform, load, orchestrate)
//!    ├─── mysql-source    (SourceReader over mysql_async)
//!    └─── bigquery-sink   (WarehouseSink over the BigQuery API)
//! ```

pub mod schema;
pub mod types;
pub mod values;
pub mod watermark;

pub use schema::{ColumnDefinition, SchemaError, TableDefinition, WarehouseColumn};
pub use types::{UniversalType, UnknownWarehouseType, WarehouseType};
pub use values::{UniversalRow, UniversalValue};
pub use watermark::{local_to_utc, WatermarkError, WatermarkValue};
