//! Sync orchestrator: drives each mapping through reconcile, extract, load
//! and commit, and is the only writer of watermarks.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use checkpoint::{RunMetadata, RunOutcome, WatermarkStore};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use sync_core::{TableDefinition, UniversalType, WarehouseColumn, WatermarkValue};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::error::{Result, SyncError};
use crate::extract::{Extractor, Pagination};
use crate::load::{ensure_keys_loaded, Loader};
use crate::mapping::{ComparisonOp, Mapping, SyncMode};
use crate::reconcile::reconcile;
use crate::result::{RunKind, RunResult, RunStatus};
use crate::retry::RetryPolicy;
use crate::sink::WarehouseSink;
use crate::source::{Bound, PageAfter, PageRequest, SourceReader};
use crate::state::{MappingRun, MappingState, Phase};
use crate::transform::Transformer;

/// Engine-wide knobs shared by every mapping.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Rows per source page
    pub page_size: usize,
    /// Create source columns missing in the destination
    pub allow_schema_additions: bool,
    /// Upper bound on mappings processed at the same time
    pub max_concurrent_mappings: usize,
    /// Zone of naive source timestamps
    pub source_timezone: Tz,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            allow_schema_additions: false,
            max_concurrent_mappings: 1,
            source_timezone: Tz::UTC,
            retry: RetryPolicy::default(),
        }
    }
}

/// Which rows a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWindow {
    /// From the stored watermark (or `backfill_start`) up to the run start.
    Incremental,
    /// A range given by the operator. Never moves the watermark. Without
    /// `end` it runs up to the run start.
    Backfill { start: String, end: Option<String> },
}

impl SyncWindow {
    pub fn kind(&self) -> RunKind {
        match self {
            Self::Incremental => RunKind::Incremental,
            Self::Backfill { .. } => RunKind::Backfill,
        }
    }
}

/// The resolved bounds of one run.
#[derive(Debug, Clone)]
struct Range {
    lower: Option<(ComparisonOp, WatermarkValue)>,
    upper: Option<WatermarkValue>,
    commit: bool,
}

/// Counters and outcomes collected while a mapping runs, kept even when it
/// fails partway.
struct Progress {
    run: MappingRun,
    rows_extracted: u64,
    rows_loaded: u64,
    previous_watermark: Option<WatermarkValue>,
    new_watermark: Option<WatermarkValue>,
    warnings: Vec<String>,
}

impl Progress {
    fn new(mapping: &str) -> Self {
        Self {
            run: MappingRun::new(mapping),
            rows_extracted: 0,
            rows_loaded: 0,
            previous_watermark: None,
            new_watermark: None,
            warnings: Vec::new(),
        }
    }
}

enum Outcome {
    Success,
    Skipped(String),
    Failed(SyncError),
}

/// Runs mappings from a source into a warehouse.
pub struct SyncEngine<S: SourceReader + ?Sized, D: WarehouseSink + ?Sized> {
    source: Arc<S>,
    sink: Arc<D>,
    store: Arc<dyn WatermarkStore>,
    settings: EngineSettings,
    cancel: CancellationToken,
}

impl<S: SourceReader + ?Sized, D: WarehouseSink + ?Sized> SyncEngine<S, D> {
    pub fn new(
        source: Arc<S>,
        sink: Arc<D>,
        store: Arc<dyn WatermarkStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one tied to Ctrl-C or a timeout.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// One incremental pass over every mapping.
    ///
    /// Mappings are independent: a failure in one never stops the others.
    /// Results come back in mapping order.
    pub async fn run_once(&self, mappings: &[Mapping]) -> Vec<RunResult> {
        let limit = self.settings.max_concurrent_mappings.max(1);
        info!(
            "Starting sync run for {} mappings (max {} concurrent)",
            mappings.len(),
            limit
        );
        let results: Vec<RunResult> = stream::iter(
            mappings
                .iter()
                .map(|m| self.run_mapping(m, SyncWindow::Incremental)),
        )
        .buffered(limit)
        .collect()
        .await;

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(
            "Sync run finished: {} mappings, {} failed",
            results.len(),
            failed
        );
        results
    }

    /// Reload a range for one mapping without touching its watermark.
    ///
    /// A date-only `end` covers that whole day. `None` ends at the run start.
    pub async fn run_backfill(
        &self,
        mapping: &Mapping,
        start: &str,
        end: Option<&str>,
    ) -> RunResult {
        self.run_mapping(
            mapping,
            SyncWindow::Backfill {
                start: start.to_string(),
                end: end.map(str::to_string),
            },
        )
        .await
    }

    /// Run one mapping to a terminal state and describe the outcome.
    pub async fn run_mapping(&self, mapping: &Mapping, window: SyncWindow) -> RunResult {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let kind = window.kind();
        let mut progress = Progress::new(&mapping.name);

        let outcome = if !mapping.enabled {
            info!("Mapping '{}' is disabled, skipping", mapping.name);
            Outcome::Skipped("mapping is disabled".to_string())
        } else if self.cancel.is_cancelled() {
            info!("Run cancelled before mapping '{}' started", mapping.name);
            Outcome::Skipped("run cancelled before the mapping started".to_string())
        } else {
            let span = tracing::info_span!(
                "mapping",
                name = %mapping.name,
                mode = %mapping.mode,
                run_id = %run_id
            );
            match self
                .execute(mapping, &window, &run_id, started_at, &mut progress)
                .instrument(span)
                .await
            {
                Ok(()) => Outcome::Success,
                Err(e) => Outcome::Failed(e),
            }
        };

        let result = self.finish(mapping, kind, run_id, started_at, progress, outcome);
        self.record(mapping, &result).await;
        result
    }

    async fn execute(
        &self,
        mapping: &Mapping,
        window: &SyncWindow,
        run_id: &str,
        started_at: DateTime<Utc>,
        progress: &mut Progress,
    ) -> Result<()> {
        let tz = self.settings.source_timezone;
        let retry = &self.settings.retry;

        // Static checks, before any I/O.
        mapping.validate(tz)?;
        if self.settings.page_size == 0 {
            return Err(SyncError::configuration("page_size must be greater than zero"));
        }
        let backfill = match window {
            SyncWindow::Backfill { start, end } => Some(parse_backfill_window(
                start,
                end.as_deref(),
                tz,
                started_at,
            )?),
            SyncWindow::Incremental => None,
        };

        info!(
            "Syncing mapping '{}' ({} -> {}, {})",
            mapping.name, mapping.source_table, mapping.destination_table, mapping.mode
        );

        // ==================== Reconciling ====================
        progress.run.advance(MappingState::Reconciling);

        let source_schema = retry
            .run(
                &format!("read schema of {}", mapping.source_table),
                &self.cancel,
                || self.source.table_schema(&mapping.source_table),
            )
            .await?;
        let incremental_type = check_source_columns(mapping, &source_schema)?;

        let destination = self.destination_columns(mapping, &source_schema).await?;
        let diff = reconcile(
            &source_schema,
            &destination,
            self.settings.allow_schema_additions,
        );
        diff.ensure_compatible(&mapping.name)?;
        if mapping.mode == SyncMode::Upsert {
            ensure_keys_loaded(mapping, &diff)?;
        }
        for column in diff.dropped_columns() {
            let message = format!(
                "column '{}' is missing in {} and was not created; its values are dropped",
                column, mapping.destination_table
            );
            warn!("{}", message);
            progress.warnings.push(message);
        }

        // ==================== Extracting ====================
        let previous = retry
            .run(
                &format!("read watermark of {}", mapping.name),
                &self.cancel,
                || async {
                    self.store
                        .get_watermark(&mapping.name)
                        .await
                        .map_err(|e| SyncError::transient(format!("{e:#}")))
                },
            )
            .await?
            .map(|w| w.value);
        progress.previous_watermark = previous;

        let range = match backfill {
            Some((start, end)) => Range {
                lower: Some((ComparisonOp::Gte, start)),
                upper: end,
                commit: false,
            },
            None => incremental_range(mapping, previous, &incremental_type, started_at, tz)?,
        };
        for value in range
            .lower
            .iter()
            .map(|(_, v)| v)
            .chain(range.upper.iter())
            .chain(previous.iter())
        {
            check_watermark_kind(mapping, value, &incremental_type)?;
        }

        progress.run.advance(MappingState::Extracting {
            lower: range.lower.map(|(_, v)| v),
            upper: range.upper,
        });

        let (order_keys, pagination) = order_keys(mapping, &source_schema);
        let request = PageRequest {
            table: mapping.source_table.clone(),
            columns: source_schema.columns.clone(),
            incremental_column: mapping.incremental_column.name.clone(),
            order_keys,
            lower: range.lower.map(|(op, v)| Bound {
                op,
                value: v.to_source_value(tz),
            }),
            upper: range.upper.map(|v| v.to_source_value(tz)),
            after: PageAfter::Start,
            limit: self.settings.page_size,
        };

        let transformer = Transformer::new(&diff, tz);
        let mut extractor = Extractor::new(
            self.source.as_ref(),
            request,
            pagination,
            retry,
            &self.cancel,
            tz,
        );
        let mut rows = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let Some(page) = extractor.next_page().await? else {
                break;
            };
            rows.extend(page.iter().map(|row| transformer.transform(row)));
            progress.rows_extracted = extractor.rows_extracted();
        }
        let next_watermark = extractor.next_watermark();
        info!(
            "Extracted {} rows from {} in {} pages",
            extractor.rows_extracted(),
            mapping.source_table,
            extractor.pages()
        );

        // ==================== Loading ====================
        progress.run.advance(MappingState::Loading {
            rows_extracted: progress.rows_extracted,
            next_watermark,
        });
        let loader = Loader::new(self.sink.as_ref(), retry, &self.cancel);
        progress.rows_loaded = loader.load(mapping, rows, &diff, run_id).await?;

        // ==================== Committing ====================
        progress.run.advance(MappingState::Committing {
            rows_loaded: progress.rows_loaded,
            next_watermark,
        });
        let committed = if range.commit {
            self.commit_watermark(mapping, previous, next_watermark)
                .await?
        } else {
            None
        };
        progress.new_watermark = committed;
        progress.run.advance(MappingState::Done { committed });
        Ok(())
    }

    /// Destination columns, creating the table from the source schema when
    /// it does not exist yet.
    async fn destination_columns(
        &self,
        mapping: &Mapping,
        source_schema: &TableDefinition,
    ) -> Result<Vec<WarehouseColumn>> {
        let retry = &self.settings.retry;
        let table = &mapping.destination_table;
        let existing = retry
            .run(&format!("read schema of {table}"), &self.cancel, || {
                self.sink.table_schema(table)
            })
            .await?;
        if let Some(columns) = existing {
            return Ok(columns);
        }

        let columns = inferred_columns(source_schema);
        retry
            .run(&format!("create table {table}"), &self.cancel, || {
                self.sink.create_table(table, &columns)
            })
            .await?;
        info!(
            "Created destination table {} with {} columns",
            table,
            columns.len()
        );
        Ok(columns)
    }

    /// Writes `max(previous, next)` if it moved. The write runs on its own
    /// token so cancellation cannot leave the commit half-retried.
    async fn commit_watermark(
        &self,
        mapping: &Mapping,
        previous: Option<WatermarkValue>,
        next: Option<WatermarkValue>,
    ) -> Result<Option<WatermarkValue>> {
        let Some(next) = next else {
            info!("No new rows for mapping '{}', watermark unchanged", mapping.name);
            return Ok(None);
        };
        let target = match previous {
            Some(prev) => prev.max(next),
            None => next,
        };
        if previous == Some(target) {
            return Ok(None);
        }

        let commit_token = CancellationToken::new();
        self.settings
            .retry
            .run(
                &format!("commit watermark of {}", mapping.name),
                &commit_token,
                || async {
                    self.store
                        .set_watermark(&mapping.name, target)
                        .await
                        .map_err(|e| SyncError::transient(format!("{e:#}")))
                },
            )
            .await?;
        Ok(Some(target))
    }

    fn finish(
        &self,
        mapping: &Mapping,
        kind: RunKind,
        run_id: String,
        started_at: DateTime<Utc>,
        mut progress: Progress,
        outcome: Outcome,
    ) -> RunResult {
        let (status, error, error_kind, failed_phase) = match outcome {
            Outcome::Success => (RunStatus::Success, None, None, None),
            Outcome::Skipped(reason) => {
                progress.warnings.push(reason);
                (RunStatus::Skipped, None, None, None)
            }
            Outcome::Failed(e) => {
                let phase = progress.run.fail().unwrap_or(Phase::Pending);
                tracing::error!(
                    "Mapping '{}' failed while {}: {}",
                    mapping.name,
                    phase,
                    e
                );
                (
                    RunStatus::Failed,
                    Some(e.to_string()),
                    Some(e.kind().to_string()),
                    Some(phase),
                )
            }
        };
        let finished_at = Utc::now();
        let duration = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let result = RunResult {
            mapping_name: mapping.name.clone(),
            run_id,
            mode: mapping.mode,
            kind,
            status,
            rows_extracted: progress.rows_extracted,
            rows_loaded: progress.rows_loaded,
            previous_watermark: progress.previous_watermark,
            new_watermark: progress.new_watermark,
            error,
            error_kind,
            failed_phase,
            final_state: progress.run.state().name().to_string(),
            warnings: progress.warnings,
            started_at,
            finished_at,
            duration_seconds: duration,
        };
        info!("{}", result.summary());
        result
    }

    /// Best effort: run metadata is informational.
    async fn record(&self, mapping: &Mapping, result: &RunResult) {
        // An invalid mapping never reaches the store, not even its name.
        if mapping.validate(self.settings.source_timezone).is_err() {
            return;
        }
        let metadata = RunMetadata {
            run_id: result.run_id.clone(),
            started_at: result.started_at,
            finished_at: result.finished_at,
            outcome: match result.status {
                RunStatus::Success => RunOutcome::Success,
                RunStatus::Failed => RunOutcome::Failed,
                RunStatus::Skipped => RunOutcome::Skipped,
            },
            rows_loaded: result.rows_loaded,
            error: result.error.clone(),
        };
        if let Err(e) = self.store.record_run(&mapping.name, &metadata).await {
            warn!(
                "Failed to record run metadata for mapping '{}': {:#}",
                mapping.name, e
            );
        }
    }
}

/// Checks the incremental and key columns against the source table and
/// returns the incremental column's type.
fn check_source_columns(mapping: &Mapping, source: &TableDefinition) -> Result<UniversalType> {
    let name = &mapping.incremental_column.name;
    let column = source.get_column(name).ok_or_else(|| {
        SyncError::configuration(format!(
            "mapping '{}': incremental column '{}' does not exist in {}",
            mapping.name, name, mapping.source_table
        ))
    })?;
    if !column.column_type.is_watermark_capable() {
        return Err(SyncError::configuration(format!(
            "mapping '{}': incremental column '{}' has type {}, expected an integer, date or timestamp",
            mapping.name, name, column.column_type
        )));
    }
    for key in &mapping.primary_keys {
        if source.get_column(key).is_none() {
            return Err(SyncError::configuration(format!(
                "mapping '{}': primary key column '{}' does not exist in {}",
                mapping.name, key, mapping.source_table
            )));
        }
    }
    Ok(column.column_type.clone())
}

fn check_watermark_kind(
    mapping: &Mapping,
    value: &WatermarkValue,
    column_type: &UniversalType,
) -> Result<()> {
    let matches = match value {
        WatermarkValue::Integer(_) => column_type.is_integral(),
        WatermarkValue::Timestamp(_) => column_type.is_temporal(),
    };
    if matches {
        return Ok(());
    }
    Err(SyncError::configuration(format!(
        "mapping '{}': watermark {} does not match incremental column '{}' of type {}",
        mapping.name, value, mapping.incremental_column.name, column_type
    )))
}

/// Lower bound from the stored watermark, falling back to `backfill_start`.
/// Temporal columns are capped at the run start; integer columns have no
/// natural cap.
fn incremental_range(
    mapping: &Mapping,
    previous: Option<WatermarkValue>,
    column_type: &UniversalType,
    started_at: DateTime<Utc>,
    tz: Tz,
) -> Result<Range> {
    let lower = match previous {
        Some(value) => Some((mapping.incremental_column.operator, value)),
        None => match &mapping.backfill_start {
            Some(start) => {
                let value = WatermarkValue::parse(start, tz).map_err(|e| {
                    SyncError::configuration(format!(
                        "mapping '{}' has invalid backfill_start: {e}",
                        mapping.name
                    ))
                })?;
                Some((ComparisonOp::Gte, value))
            }
            None => None,
        },
    };
    let upper = (!column_type.is_integral()).then_some(WatermarkValue::Timestamp(started_at));
    Ok(Range {
        lower,
        upper,
        commit: true,
    })
}

/// Parses a backfill window. Both ends are inclusive.
///
/// Without `end`, timestamp windows end at `started_at` and integer windows
/// have no upper bound.
pub fn parse_backfill_window(
    start: &str,
    end: Option<&str>,
    tz: Tz,
    started_at: DateTime<Utc>,
) -> Result<(WatermarkValue, Option<WatermarkValue>)> {
    let parse = |label: &str, s: &str| {
        WatermarkValue::parse(s, tz)
            .map_err(|e| SyncError::configuration(format!("backfill {label}: {e}")))
    };
    let lower = parse("start", start)?;
    let Some(end) = end else {
        return match lower {
            WatermarkValue::Integer(_) => Ok((lower, None)),
            WatermarkValue::Timestamp(t) if t > started_at => Err(SyncError::configuration(
                format!("backfill start '{start}' is after the run start"),
            )),
            WatermarkValue::Timestamp(_) => {
                Ok((lower, Some(WatermarkValue::Timestamp(started_at))))
            }
        };
    };
    let upper = match NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d") {
        Ok(date) => {
            let last_instant = date.and_hms_micro_opt(23, 59, 59, 999_999).ok_or_else(|| {
                SyncError::configuration(format!("backfill end: invalid date '{end}'"))
            })?;
            WatermarkValue::from_local(last_instant, tz)
                .map_err(|e| SyncError::configuration(format!("backfill end: {e}")))?
        }
        Err(_) => parse("end", end)?,
    };
    match lower.partial_cmp(&upper) {
        None => Err(SyncError::configuration(format!(
            "backfill start '{start}' and end '{end}' are of different kinds"
        ))),
        Some(std::cmp::Ordering::Greater) => Err(SyncError::configuration(format!(
            "backfill start '{start}' is after end '{end}'"
        ))),
        Some(_) => Ok((lower, Some(upper))),
    }
}

/// Destination schema for a table that does not exist yet.
fn inferred_columns(source: &TableDefinition) -> Vec<WarehouseColumn> {
    source
        .columns
        .iter()
        .map(|c| {
            let mut column = WarehouseColumn::new(&c.name, c.column_type.warehouse_type());
            column.nullable = c.nullable;
            column
        })
        .collect()
}

/// Secondary sort keys for pagination. Keyset continuation needs a unique
/// tie-break, so it is used only with the table's declared primary key.
/// Otherwise pages are taken by offset, ordered by the mapping's keys and
/// then every other comparable column.
fn order_keys(mapping: &Mapping, source: &TableDefinition) -> (Vec<String>, Pagination) {
    let incremental = &mapping.incremental_column.name;
    if !source.primary_key.is_empty() {
        let keys = source
            .primary_key
            .iter()
            .filter(|k| *k != incremental)
            .cloned()
            .collect();
        return (keys, Pagination::Keyset);
    }

    warn!(
        "Table {} has no primary key; paging by offset, rows sharing an incremental value may be reordered between pages",
        mapping.source_table
    );
    let mut keys: Vec<String> = mapping
        .primary_keys
        .iter()
        .filter(|k| *k != incremental)
        .cloned()
        .collect();
    let rest: Vec<String> = source
        .columns
        .iter()
        .filter(|c| &c.name != incremental && !keys.contains(&c.name))
        .filter(|c| {
            !matches!(
                c.column_type,
                UniversalType::Text | UniversalType::Bytes | UniversalType::Json
            )
        })
        .map(|c| c.name.clone())
        .collect();
    keys.extend(rest);
    (keys, Pagination::Offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::IncrementalColumn;
    use chrono::TimeZone;
    use sync_core::ColumnDefinition;

    #[test]
    fn test_backfill_window_date_end_covers_whole_day() {
        let (lower, upper) =
            parse_backfill_window("2020-01-01", Some("2020-12-31"), Tz::UTC, Utc::now()).unwrap();
        assert_eq!(
            lower,
            WatermarkValue::Timestamp(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
        let Some(WatermarkValue::Timestamp(end)) = upper else {
            panic!("expected a timestamp");
        };
        assert!(end > Utc.with_ymd_and_hms(2020, 12, 31, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_backfill_window_rejects_inverted_and_mixed() {
        assert!(matches!(
            parse_backfill_window("2021-01-01", Some("2020-01-01"), Tz::UTC, Utc::now()),
            Err(SyncError::Configuration(_))
        ));
        assert!(matches!(
            parse_backfill_window("10", Some("2020-01-01"), Tz::UTC, Utc::now()),
            Err(SyncError::Configuration(_))
        ));
        assert!(parse_backfill_window("10", Some("20"), Tz::UTC, Utc::now()).is_ok());
    }

    #[test]
    fn test_backfill_window_without_end() {
        let started_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (lower, upper) =
            parse_backfill_window("2024-01-01", None, Tz::UTC, started_at).unwrap();
        assert_eq!(
            lower,
            WatermarkValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(upper, Some(WatermarkValue::Timestamp(started_at)));

        let (lower, upper) = parse_backfill_window("100", None, Tz::UTC, started_at).unwrap();
        assert_eq!(lower, WatermarkValue::Integer(100));
        assert_eq!(upper, None);

        assert!(matches!(
            parse_backfill_window("2024-07-01", None, Tz::UTC, started_at),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_order_keys_fallbacks() {
        let mapping = Mapping::new(
            "logs",
            "logs",
            "logs",
            SyncMode::Append,
            IncrementalColumn::new("ts", ComparisonOp::Gt),
        );
        let with_pk = TableDefinition::new(
            "logs",
            vec![
                ColumnDefinition::new("id", UniversalType::Int64),
                ColumnDefinition::new("ts", UniversalType::LocalDateTime),
            ],
        )
        .with_primary_key(&["id"]);
        assert_eq!(
            order_keys(&mapping, &with_pk),
            (vec!["id".to_string()], Pagination::Keyset)
        );

        let without_pk = TableDefinition::new(
            "logs",
            vec![
                ColumnDefinition::new("host", UniversalType::varchar(64)),
                ColumnDefinition::new("ts", UniversalType::LocalDateTime),
                ColumnDefinition::nullable("message", UniversalType::Text),
            ],
        );
        assert_eq!(
            order_keys(&mapping, &without_pk),
            (vec!["host".to_string()], Pagination::Offset)
        );

        // Mapping keys are not known to be unique, so they only lead the
        // offset ordering.
        let keyed = mapping.clone().with_primary_keys(&["message"]);
        assert_eq!(
            order_keys(&keyed, &without_pk),
            (
                vec!["message".to_string(), "host".to_string()],
                Pagination::Offset
            )
        );
    }

    #[test]
    fn test_integer_column_has_no_upper_bound() {
        let mapping = Mapping::new(
            "events",
            "events",
            "events",
            SyncMode::Append,
            IncrementalColumn::new("id", ComparisonOp::Gt),
        );
        let range = incremental_range(
            &mapping,
            Some(WatermarkValue::Integer(7)),
            &UniversalType::Int64,
            Utc::now(),
            Tz::UTC,
        )
        .unwrap();
        assert_eq!(range.lower, Some((ComparisonOp::Gt, WatermarkValue::Integer(7))));
        assert_eq!(range.upper, None);
        assert!(range.commit);
    }
}
