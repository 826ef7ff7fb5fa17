//! warehouse-sync
//!
//! Incremental replication of MySQL tables into BigQuery. Each configured
//! mapping copies the rows whose incremental column (typically
//! `updated_at`) moved past the stored watermark, appends or merges them
//! into the destination table through a staging table, and only then
//! advances the watermark.
//!
//! # Crates
//!
//! - `sync_core` - types, values and watermarks shared by every stage
//! - `checkpoint` - watermark state on the local filesystem or S3
//! - `sync_engine` - reconcile, extract, transform, load and orchestrate
//! - `warehouse_sync_mysql_source` - the MySQL source reader
//! - `warehouse_sync_bigquery_sink` - the BigQuery warehouse sink
//!
//! # CLI Usage
//!
//! ```bash
//! # One pass over every mapping
//! warehouse-sync --config config.yaml run-once
//!
//! # Run daily at the configured cron time until Ctrl-C
//! warehouse-sync --config config.yaml schedule
//!
//! # Reload a closed range without moving the watermark
//! warehouse-sync backfill --mapping orders --start 2020-01-01 --end 2020-12-31
//! ```

pub mod config;
pub mod report;
pub mod run;
pub mod schedule;

pub use config::Config;
pub use report::write_report;
pub use run::{arm_timeout, App, TimeoutGuard};
pub use schedule::{run_scheduled, CronSchedule};
