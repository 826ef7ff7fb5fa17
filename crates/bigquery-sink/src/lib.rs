//! BigQuery implementation of the engine's [`WarehouseSink`](sync_engine::WarehouseSink).
//!
//! All writes are GoogleSQL statements run as query jobs: rows are inserted
//! into a per-run staging table with multi-row `INSERT ... VALUES`, then
//! moved into the destination with one `INSERT ... SELECT` or `MERGE`.

pub mod config;
pub mod error;
pub mod runner;
pub mod sink;
pub mod sql;

pub use config::BigQueryConfig;
pub use error::classify_bigquery_error;
pub use runner::{BigQueryClient, QueryRunner};
pub use sink::{request_id, BigQuerySink, MAX_QUERY_BYTES};
pub use sql::{quote_identifier, quote_string, render_literal, Dataset};
