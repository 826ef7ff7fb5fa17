//! Watermark management for warehouse-sync
//!
//! Persists, per mapping, the greatest incremental-column value durably
//! loaded into the warehouse plus metadata about the latest run.
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores one JSON document per mapping in a directory
//! - `S3Store` - Stores one JSON object per mapping under a bucket prefix
//! - `GcsStore` - The same layout in a Google Cloud Storage bucket
//! - `MemoryStore` - Keeps documents in memory (tests, dry runs)
//!
//! Each mapping has its own document, so concurrent runs of different
//! mappings never overwrite each other's watermarks.

mod config;
mod filesystem;
mod gcs;
mod memory;
mod s3;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::StateStorage;
pub use filesystem::FilesystemStore;
pub use gcs::GcsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use store::{RunMetadata, RunOutcome, StoredState, Watermark, WatermarkStore};
