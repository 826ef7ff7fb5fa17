//! MySQL type conversions for sync-core types.
//!
//! # Structure
//!
//! - `schema`: MySQL INFORMATION_SCHEMA column type -> `UniversalType`
//! - `reverse`: MySQL values -> `UniversalValue` (reading extracted rows)
//! - `forward`: `UniversalValue` -> MySQL values (binding query parameters)
//!
//! # Example
//!
//! ```rust
//! use mysql_types::mysql_column_to_universal_type;
//! use sync_core::UniversalType;
//!
//! let ut = mysql_column_to_universal_type("INT", "int(11)", None, None);
//! assert_eq!(ut, UniversalType::Int32);
//! ```

pub mod forward;
pub mod reverse;
pub mod schema;

pub use forward::to_mysql_value;
pub use reverse::{mysql_value_to_universal, ConversionError};
pub use schema::mysql_column_to_universal_type;
