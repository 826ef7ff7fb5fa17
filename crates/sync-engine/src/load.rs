//! Staged loading into the warehouse.
//!
//! Rows never go straight into a destination table. They are written to a
//! staging table owned by this run, and a single set-based statement
//! (INSERT ... SELECT for append, MERGE for upsert) moves them across. The
//! staging table is dropped whether or not that statement succeeds.

use std::collections::HashMap;
use sync_core::UniversalRow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::mapping::{Mapping, SyncMode};
use crate::reconcile::SchemaDiff;
use crate::retry::RetryPolicy;
use crate::sink::WarehouseSink;

/// Name of the staging table for one run of one destination table.
pub fn staging_table_name(destination: &str, run_id: &str) -> String {
    format!("_{destination}_staging_{run_id}")
}

/// Keeps only the last row for each key tuple, preserving the order in
/// which surviving rows were extracted. A row with a NULL or absent key
/// never matches another row, in the MERGE or here, so it is always kept.
pub fn dedupe_by_key(rows: Vec<UniversalRow>, keys: &[String]) -> Vec<UniversalRow> {
    let mut last_index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if let Some(key) = key_of(row, keys) {
            last_index.insert(key, idx);
        }
    }
    rows.into_iter()
        .enumerate()
        .filter(|(idx, row)| match key_of(row, keys) {
            Some(key) => last_index.get(&key) == Some(idx),
            None => true,
        })
        .map(|(_, row)| row)
        .collect()
}

fn key_of(row: &UniversalRow, keys: &[String]) -> Option<String> {
    let parts = keys
        .iter()
        .map(|k| {
            row.get(k)
                .filter(|v| !v.is_null())
                .map(|v| format!("{v:?}"))
        })
        .collect::<Option<Vec<String>>>()?;
    Some(parts.join("\u{1f}"))
}

pub struct Loader<'a, D: WarehouseSink + ?Sized> {
    sink: &'a D,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
}

impl<'a, D: WarehouseSink + ?Sized> Loader<'a, D> {
    pub fn new(sink: &'a D, retry: &'a RetryPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            sink,
            retry,
            cancel,
        }
    }

    /// Create destination columns the reconciler asked for.
    ///
    /// Runs before any staging so a failure here leaves nothing behind.
    pub async fn add_missing_columns(&self, mapping: &Mapping, diff: &SchemaDiff) -> Result<()> {
        if !diff.create_missing || diff.missing_in_destination.is_empty() {
            return Ok(());
        }
        let table = &mapping.destination_table;
        let columns = &diff.missing_in_destination;
        self.retry
            .run(&format!("add columns to {table}"), self.cancel, || {
                self.sink.add_columns(table, columns)
            })
            .await?;
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        info!("Added columns {:?} to {}", names, table);
        Ok(())
    }

    /// Load transformed rows. Returns the number of rows written to staging,
    /// which for upsert is the number of distinct keys.
    pub async fn load(
        &self,
        mapping: &Mapping,
        rows: Vec<UniversalRow>,
        diff: &SchemaDiff,
        run_id: &str,
    ) -> Result<u64> {
        self.add_missing_columns(mapping, diff).await?;

        if rows.is_empty() {
            debug!("No rows to load for mapping '{}'", mapping.name);
            return Ok(0);
        }

        let rows = match mapping.mode {
            SyncMode::Upsert => {
                let before = rows.len();
                let deduped = dedupe_by_key(rows, &mapping.primary_keys);
                if deduped.len() < before {
                    debug!(
                        "Collapsed {} duplicate keys for mapping '{}'",
                        before - deduped.len(),
                        mapping.name
                    );
                }
                deduped
            }
            SyncMode::Append => rows,
        };

        let staging = staging_table_name(&mapping.destination_table, run_id);
        let outcome = self.stage_and_commit(mapping, &rows, diff, &staging).await;
        self.drop_staging(&staging).await;
        outcome?;

        info!(
            "Loaded {} rows into {} ({})",
            rows.len(),
            mapping.destination_table,
            mapping.mode
        );
        Ok(rows.len() as u64)
    }

    async fn stage_and_commit(
        &self,
        mapping: &Mapping,
        rows: &[UniversalRow],
        diff: &SchemaDiff,
        staging: &str,
    ) -> Result<()> {
        let columns = &diff.load_columns;
        let column_names = diff.load_column_names();
        let target = &mapping.destination_table;

        self.retry
            .run(&format!("create staging table {staging}"), self.cancel, || {
                self.sink.create_staging_table(staging, columns)
            })
            .await?;

        let chunk_size = self.sink.max_rows_per_insert().max(1);
        for (i, chunk) in rows.chunks(chunk_size).enumerate() {
            let first_row = (i * chunk_size) as u64;
            self.retry
                .run(&format!("insert into {staging}"), self.cancel, || {
                    self.sink.insert_rows(staging, columns, chunk, first_row)
                })
                .await?;
        }

        match mapping.mode {
            SyncMode::Append => {
                self.retry
                    .run(&format!("insert into {target}"), self.cancel, || {
                        self.sink.insert_from_staging(staging, target, &column_names)
                    })
                    .await
            }
            SyncMode::Upsert => {
                self.retry
                    .run(&format!("merge into {target}"), self.cancel, || {
                        self.sink
                            .merge_from_staging(staging, target, &mapping.primary_keys, &column_names)
                    })
                    .await
            }
        }
    }

    /// Best effort. After cancellation only one attempt is made.
    async fn drop_staging(&self, staging: &str) {
        let policy = if self.cancel.is_cancelled() {
            RetryPolicy::no_retry()
        } else {
            self.retry.clone()
        };
        let result = policy
            .run(
                &format!("drop staging table {staging}"),
                &CancellationToken::new(),
                || self.sink.drop_table(staging),
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to drop staging table {}: {}", staging, e);
        }
    }
}

/// Checks that every key column survives reconciliation, so the merge can
/// match on it.
pub fn ensure_keys_loaded(mapping: &Mapping, diff: &SchemaDiff) -> Result<()> {
    for key in &mapping.primary_keys {
        if diff.target_type(key).is_none() {
            return Err(SyncError::SchemaIncompatible(format!(
                "mapping '{}': key column '{}' is not present in destination {}",
                mapping.name, key, mapping.destination_table
            )));
        }
    }
    Ok(())
}
