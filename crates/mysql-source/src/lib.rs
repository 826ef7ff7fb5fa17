//! MySQL implementation of the engine's [`SourceReader`](sync_engine::SourceReader).
//!
//! Schema comes from `INFORMATION_SCHEMA`; rows are read with keyset
//! pagination on `(incremental column, primary key...)` through prepared
//! statements, so bounds and cursors are always bound as parameters.

pub mod client;
pub mod error;
pub mod query;
pub mod schema;
pub mod source;
pub mod testing;

pub use client::{new_mysql_pool, sanitize_connection_string};
pub use error::classify_mysql_error;
pub use query::{build_page_query, quote_identifier};
pub use source::MySqlSource;
