//! In-memory sources, sinks and stores for exercising the engine without a
//! database or a warehouse.
//!
//! Each fake supports fault injection so retry, failure isolation and
//! cleanup paths can be driven deterministically.

use async_trait::async_trait;
use checkpoint::{MemoryStore, StoredState, WatermarkStore};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use sync_core::{TableDefinition, UniversalRow, UniversalValue, WarehouseColumn};
use tokio::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::mapping::ComparisonOp;
use crate::sink::WarehouseSink;
use crate::source::{PageAfter, PageRequest, SourceReader};

/// Kind of error an injected fault raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `SyncError::TransientIo`, retried by the engine
    Transient,
    /// `SyncError::RunFailed`, not retried
    Fatal,
    /// The operation takes effect, then `SyncError::TransientIo` is raised,
    /// like a timeout that fires after the warehouse committed the job
    Ambiguous,
}

impl FaultKind {
    fn error(self, what: &str) -> SyncError {
        match self {
            Self::Transient => SyncError::transient(format!("injected transient failure in {what}")),
            Self::Fatal => SyncError::failed(format!("injected fatal failure in {what}")),
            Self::Ambiguous => {
                SyncError::transient(format!("injected timeout after {what} was applied"))
            }
        }
    }
}

fn push_faults(queue: &mut VecDeque<FaultKind>, count: usize, kind: FaultKind) {
    queue.extend(std::iter::repeat(kind).take(count));
}

/// Orders two scalar values the way the source database would. Values of
/// unrelated types are incomparable.
pub fn compare_values(a: &UniversalValue, b: &UniversalValue) -> Option<Ordering> {
    use UniversalValue as V;
    if let (Some(x), Some(y)) = (a.as_integer(), b.as_integer()) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (V::Float64(x), V::Float64(y)) => x.partial_cmp(y),
        (V::Bool(x), V::Bool(y)) => Some(x.cmp(y)),
        (V::Text(x), V::Text(y)) => Some(x.cmp(y)),
        (V::Date(x), V::Date(y)) => Some(x.cmp(y)),
        (V::Date(x), V::LocalDateTime(y)) => Some(x.and_time(chrono::NaiveTime::MIN).cmp(y)),
        (V::LocalDateTime(x), V::Date(y)) => Some(x.cmp(&y.and_time(chrono::NaiveTime::MIN))),
        (V::LocalDateTime(x), V::LocalDateTime(y)) => Some(x.cmp(y)),
        (V::ZonedDateTime(x), V::ZonedDateTime(y)) => Some(x.cmp(y)),
        (V::Uuid(x), V::Uuid(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_rows(a: &UniversalRow, b: &UniversalRow, columns: &[&str]) -> Ordering {
    for column in columns {
        let ord = match (a.get(column), b.get(column)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn matches_request(row: &UniversalRow, request: &PageRequest) -> bool {
    let Some(value) = row.get(&request.incremental_column) else {
        return false;
    };
    if value.is_null() {
        return false;
    }
    if let Some(lower) = &request.lower {
        let passes = match compare_values(value, &lower.value) {
            Some(ord) => match lower.op {
                ComparisonOp::Gt => ord == Ordering::Greater,
                ComparisonOp::Gte => ord != Ordering::Less,
            },
            None => false,
        };
        if !passes {
            return false;
        }
    }
    if let Some(upper) = &request.upper {
        if !matches!(compare_values(value, upper), Some(Ordering::Less | Ordering::Equal)) {
            return false;
        }
    }
    if let PageAfter::Key(after) = &request.after {
        for (column, bound) in request.keyset_columns().into_iter().zip(after) {
            let ord = row
                .get(column)
                .and_then(|v| compare_values(v, bound))
                .unwrap_or(Ordering::Equal);
            match ord {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => {}
            }
        }
        return false;
    }
    true
}

struct SourceTable {
    schema: TableDefinition,
    rows: Vec<UniversalRow>,
}

/// A relational source held in memory.
///
/// `fetch_page` applies the same predicate, ordering and continuation a
/// SQL source would.
#[derive(Default)]
pub struct MemorySource {
    tables: Mutex<HashMap<String, SourceTable>>,
    fetch_faults: Mutex<VecDeque<FaultKind>>,
    schema_faults: Mutex<VecDeque<FaultKind>>,
    requests: Mutex<Vec<PageRequest>>,
    fetches: AtomicUsize,
    schema_reads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_table(&self, schema: TableDefinition, rows: Vec<UniversalRow>) {
        self.tables
            .lock()
            .await
            .insert(schema.name.clone(), SourceTable { schema, rows });
    }

    /// Append rows to an existing table.
    pub async fn insert_rows(&self, table: &str, rows: Vec<UniversalRow>) {
        if let Some(t) = self.tables.lock().await.get_mut(table) {
            t.rows.extend(rows);
        }
    }

    /// Replace every row whose `keys` columns equal the new row's.
    pub async fn update_row(&self, table: &str, keys: &[&str], row: UniversalRow) {
        let mut tables = self.tables.lock().await;
        let Some(t) = tables.get_mut(table) else {
            return;
        };
        for existing in t.rows.iter_mut() {
            if keys.iter().all(|k| existing.get(k) == row.get(k)) {
                *existing = row.clone();
            }
        }
    }

    /// Number of `fetch_page` calls so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    /// Number of `table_schema` calls so far, failed ones included.
    pub fn schema_read_count(&self) -> usize {
        self.schema_reads.load(AtomicOrdering::SeqCst)
    }

    /// Every page request received, in order.
    pub async fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn fail_next_fetches(&self, count: usize, kind: FaultKind) {
        push_faults(&mut *self.fetch_faults.lock().await, count, kind);
    }

    pub async fn fail_next_schema_reads(&self, count: usize, kind: FaultKind) {
        push_faults(&mut *self.schema_faults.lock().await, count, kind);
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn table_schema(&self, table: &str) -> Result<TableDefinition> {
        self.schema_reads.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(kind) = self.schema_faults.lock().await.pop_front() {
            return Err(kind.error("table_schema"));
        }
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| SyncError::configuration(format!("source table '{table}' does not exist")))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<UniversalRow>> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        self.requests.lock().await.push(request.clone());
        if let Some(kind) = self.fetch_faults.lock().await.pop_front() {
            return Err(kind.error("fetch_page"));
        }

        let tables = self.tables.lock().await;
        let table = tables.get(&request.table).ok_or_else(|| {
            SyncError::configuration(format!("source table '{}' does not exist", request.table))
        })?;

        let order = request.keyset_columns();
        let mut rows: Vec<&UniversalRow> = table
            .rows
            .iter()
            .filter(|row| matches_request(row, request))
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, &order));

        let skip = match request.after {
            PageAfter::Offset(n) => n as usize,
            _ => 0,
        };
        Ok(rows
            .into_iter()
            .skip(skip)
            .take(request.limit)
            .map(|row| {
                request
                    .columns
                    .iter()
                    .map(|c| {
                        let value = row.get(&c.name).cloned().unwrap_or(UniversalValue::Null);
                        (c.name.clone(), value)
                    })
                    .collect()
            })
            .collect())
    }
}

/// Warehouse operations, for fault injection and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseOp {
    TableSchema,
    CreateTable,
    AddColumns,
    CreateStaging,
    InsertRows,
    InsertFromStaging,
    Merge,
    DropTable,
}

#[derive(Debug, Clone)]
struct WarehouseTable {
    columns: Vec<WarehouseColumn>,
    rows: Vec<UniversalRow>,
}

impl WarehouseTable {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A warehouse held in memory, with MERGE and INSERT ... SELECT semantics.
///
/// Writes are idempotent the way [`WarehouseSink`] requires: repeating an
/// insert, insert-select or merge with the same arguments is a no-op.
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, WarehouseTable>>,
    applied: Mutex<HashSet<String>>,
    faults: Mutex<HashMap<WarehouseOp, VecDeque<FaultKind>>>,
    ops: Mutex<Vec<WarehouseOp>>,
    max_rows_per_insert: usize,
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            applied: Mutex::new(HashSet::new()),
            faults: Mutex::new(HashMap::new()),
            ops: Mutex::new(Vec::new()),
            max_rows_per_insert: 500,
        }
    }

    pub fn with_max_rows_per_insert(mut self, rows: usize) -> Self {
        self.max_rows_per_insert = rows;
        self
    }

    /// Create a pre-existing destination table.
    pub async fn create_table_with(&self, table: &str, columns: Vec<WarehouseColumn>) {
        self.tables.lock().await.insert(
            table.to_string(),
            WarehouseTable {
                columns,
                rows: Vec::new(),
            },
        );
    }

    pub async fn rows(&self, table: &str) -> Vec<UniversalRow> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn columns(&self, table: &str) -> Option<Vec<WarehouseColumn>> {
        self.tables.lock().await.get(table).map(|t| t.columns.clone())
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn fail_next(&self, op: WarehouseOp, count: usize, kind: FaultKind) {
        let mut faults = self.faults.lock().await;
        push_faults(faults.entry(op).or_default(), count, kind);
    }

    /// Every operation attempted, failed ones included.
    pub async fn ops(&self) -> Vec<WarehouseOp> {
        self.ops.lock().await.clone()
    }

    pub async fn op_count(&self, op: WarehouseOp) -> usize {
        self.ops.lock().await.iter().filter(|o| **o == op).count()
    }

    /// Record `op` and raise any injected fault. Returns true when the
    /// operation must be applied and then reported as failed.
    async fn begin(&self, op: WarehouseOp) -> Result<bool> {
        self.ops.lock().await.push(op);
        let fault = self
            .faults
            .lock()
            .await
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(FaultKind::Ambiguous) => Ok(true),
            Some(kind) => Err(kind.error(&format!("{op:?}"))),
            None => Ok(false),
        }
    }

    /// False if a write with this identity was already applied.
    async fn first_application(&self, identity: String) -> bool {
        self.applied.lock().await.insert(identity)
    }
}

fn settle(op: WarehouseOp, ambiguous: bool) -> Result<()> {
    if ambiguous {
        Err(FaultKind::Ambiguous.error(&format!("{op:?}")))
    } else {
        Ok(())
    }
}

fn project(row: &UniversalRow, columns: &[String]) -> UniversalRow {
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(UniversalValue::Null)))
        .collect()
}

fn missing_table(table: &str) -> SyncError {
    SyncError::failed(format!("table {table} does not exist"))
}

#[async_trait]
impl WarehouseSink for MemoryWarehouse {
    async fn table_schema(&self, table: &str) -> Result<Option<Vec<WarehouseColumn>>> {
        let ambiguous = self.begin(WarehouseOp::TableSchema).await?;
        settle(WarehouseOp::TableSchema, ambiguous)?;
        Ok(self.columns(table).await)
    }

    async fn create_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::CreateTable).await?;
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_insert_with(|| WarehouseTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            });
        settle(WarehouseOp::CreateTable, ambiguous)
    }

    async fn add_columns(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::AddColumns).await?;
        let mut tables = self.tables.lock().await;
        let target = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        for column in columns {
            if !target.has_column(&column.name) {
                target.columns.push(column.clone());
            }
        }
        settle(WarehouseOp::AddColumns, ambiguous)
    }

    async fn create_staging_table(&self, table: &str, columns: &[WarehouseColumn]) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::CreateStaging).await?;
        self.tables.lock().await.insert(
            table.to_string(),
            WarehouseTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        settle(WarehouseOp::CreateStaging, ambiguous)
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[WarehouseColumn],
        rows: &[UniversalRow],
        first_row: u64,
    ) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::InsertRows).await?;
        if self.first_application(format!("insert {table} @{first_row}")).await {
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let mut tables = self.tables.lock().await;
            let target = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
            target.rows.extend(rows.iter().map(|r| project(r, &names)));
        }
        settle(WarehouseOp::InsertRows, ambiguous)
    }

    async fn insert_from_staging(
        &self,
        staging: &str,
        target: &str,
        columns: &[String],
    ) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::InsertFromStaging).await?;
        if !self
            .first_application(format!("insert-select {staging} -> {target}"))
            .await
        {
            return settle(WarehouseOp::InsertFromStaging, ambiguous);
        }
        let mut tables = self.tables.lock().await;
        let staged = tables
            .get(staging)
            .ok_or_else(|| missing_table(staging))?
            .rows
            .clone();
        let target = tables.get_mut(target).ok_or_else(|| missing_table(target))?;
        target.rows.extend(staged.iter().map(|r| project(r, columns)));
        settle(WarehouseOp::InsertFromStaging, ambiguous)
    }

    async fn merge_from_staging(
        &self,
        staging: &str,
        target: &str,
        keys: &[String],
        columns: &[String],
    ) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::Merge).await?;
        if !self
            .first_application(format!("merge {staging} -> {target}"))
            .await
        {
            return settle(WarehouseOp::Merge, ambiguous);
        }
        let mut tables = self.tables.lock().await;
        let staged = tables
            .get(staging)
            .ok_or_else(|| missing_table(staging))?
            .rows
            .clone();

        let key_of = |row: &UniversalRow| -> Option<Vec<UniversalValue>> {
            keys.iter()
                .map(|k| row.get(k).filter(|v| !v.is_null()).cloned())
                .collect()
        };

        let mut seen = HashSet::new();
        for row in &staged {
            if let Some(key) = key_of(row) {
                if !seen.insert(format!("{key:?}")) {
                    return Err(SyncError::failed(
                        "MERGE must match at most one source row for each target row",
                    ));
                }
            }
        }

        let target = tables.get_mut(target).ok_or_else(|| missing_table(target))?;
        for row in &staged {
            let key = key_of(row);
            let matched = key.as_ref().and_then(|key| {
                target
                    .rows
                    .iter()
                    .position(|existing| key_of(existing).as_ref() == Some(key))
            });
            match matched {
                Some(idx) => {
                    for column in columns.iter().filter(|c| !keys.contains(c)) {
                        let value = row.get(column).cloned().unwrap_or(UniversalValue::Null);
                        target.rows[idx].set(column.clone(), value);
                    }
                }
                None => target.rows.push(project(row, columns)),
            }
        }
        settle(WarehouseOp::Merge, ambiguous)
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let ambiguous = self.begin(WarehouseOp::DropTable).await?;
        self.tables.lock().await.remove(table);
        settle(WarehouseOp::DropTable, ambiguous)
    }

    fn max_rows_per_insert(&self) -> usize {
        self.max_rows_per_insert
    }
}

/// A [`MemoryStore`] whose reads or writes can be made to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl WatermarkStore for FailingStore {
    async fn load_state(&self, mapping: &str) -> anyhow::Result<Option<StoredState>> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            anyhow::bail!("injected state read failure for '{mapping}'");
        }
        self.inner.load_state(mapping).await
    }

    async fn save_state(&self, mapping: &str, state: &StoredState) -> anyhow::Result<()> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            anyhow::bail!("injected state write failure for '{mapping}'");
        }
        self.inner.save_state(mapping, state).await
    }

    fn describe(&self) -> String {
        "failing-memory".to_string()
    }
}
