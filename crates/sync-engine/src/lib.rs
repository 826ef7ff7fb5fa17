//! Incremental sync engine.
//!
//! Moves changed rows from a relational source into an analytical
//! warehouse, one mapping at a time:
//!
//! 1. **Reconcile** the source schema against the destination
//! 2. **Extract** rows past the stored watermark in keyset-paginated pages
//! 3. **Transform** values into their destination types
//! 4. **Load** through a per-run staging table (append or merge)
//! 5. **Commit** the new watermark, only after the load is durable
//!
//! The source, the warehouse and the watermark store are traits, so the
//! engine itself holds no connection and no process state.

pub mod error;
pub mod extract;
pub mod load;
pub mod mapping;
pub mod orchestrator;
pub mod reconcile;
pub mod result;
pub mod retry;
pub mod sink;
pub mod source;
pub mod state;
pub mod testing;
pub mod transform;

pub use error::{ErrorClass, Result, SyncError};
pub use extract::{Extractor, Pagination};
pub use load::{dedupe_by_key, staging_table_name, Loader};
pub use mapping::{validate_mappings, ComparisonOp, IncrementalColumn, Mapping, SyncMode};
pub use orchestrator::{parse_backfill_window, EngineSettings, SyncEngine, SyncWindow};
pub use reconcile::{reconcile, SchemaDiff, TypeMismatch};
pub use result::{any_failed, RunKind, RunResult, RunStatus};
pub use retry::RetryPolicy;
pub use sink::WarehouseSink;
pub use source::{Bound, PageAfter, PageRequest, SourceReader};
pub use state::{MappingRun, MappingState, Phase};
pub use transform::{coerce, Transformer};
