//! Table mappings: which source table feeds which warehouse table, and how.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use sync_core::WatermarkValue;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Append,
    Upsert,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => f.write_str("append"),
            Self::Upsert => f.write_str("upsert"),
        }
    }
}

/// Comparison applied between the incremental column and the stored watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[default]
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
}

impl ComparisonOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// Incremental column with its comparison operator.
///
/// Accepts either a bare column name or `{ name, operator }` in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IncrementalColumnRepr")]
pub struct IncrementalColumn {
    pub name: String,
    pub operator: ComparisonOp,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncrementalColumnRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        operator: ComparisonOp,
    },
}

impl From<IncrementalColumnRepr> for IncrementalColumn {
    fn from(repr: IncrementalColumnRepr) -> Self {
        match repr {
            IncrementalColumnRepr::Name(name) => Self {
                name,
                operator: ComparisonOp::default(),
            },
            IncrementalColumnRepr::Full { name, operator } => Self { name, operator },
        }
    }
}

impl IncrementalColumn {
    pub fn new(name: impl Into<String>, operator: ComparisonOp) -> Self {
        Self {
            name: name.into(),
            operator,
        }
    }
}

/// One source table replicated into one destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub name: String,
    #[serde(alias = "mysql_table")]
    pub source_table: String,
    #[serde(alias = "bigquery_table")]
    pub destination_table: String,
    #[serde(default)]
    pub mode: SyncMode,
    pub incremental_column: IncrementalColumn,
    /// Ordered key columns. Required for upsert; also used as the pagination
    /// tie-break when present.
    #[serde(default)]
    pub primary_keys: Vec<String>,
    /// Lower bound used when no watermark has been stored yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_start: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Mapping {
    pub fn new(
        name: impl Into<String>,
        source_table: impl Into<String>,
        destination_table: impl Into<String>,
        mode: SyncMode,
        incremental_column: IncrementalColumn,
    ) -> Self {
        Self {
            name: name.into(),
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            mode,
            incremental_column,
            primary_keys: Vec::new(),
            backfill_start: None,
            enabled: true,
        }
    }

    pub fn with_primary_keys(mut self, keys: &[&str]) -> Self {
        self.primary_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_backfill_start(mut self, start: impl Into<String>) -> Self {
        self.backfill_start = Some(start.into());
        self
    }

    /// Static checks that need no I/O.
    pub fn validate(&self, tz: Tz) -> Result<(), SyncError> {
        if !is_safe_name(&self.name) {
            return Err(SyncError::configuration(format!(
                "mapping name '{}' must be non-empty and contain only letters, digits, '_', '-' or '.'",
                self.name
            )));
        }
        if self.source_table.trim().is_empty() || self.destination_table.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "mapping '{}' needs both a source and a destination table",
                self.name
            )));
        }
        if self.incremental_column.name.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "mapping '{}' has an empty incremental column",
                self.name
            )));
        }
        if self.mode == SyncMode::Upsert && self.primary_keys.is_empty() {
            return Err(SyncError::configuration(format!(
                "mapping '{}' uses upsert mode but has no primary_keys",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for key in &self.primary_keys {
            if !seen.insert(key.as_str()) {
                return Err(SyncError::configuration(format!(
                    "mapping '{}' lists primary key '{}' twice",
                    self.name, key
                )));
            }
        }
        if let Some(start) = &self.backfill_start {
            WatermarkValue::parse(start, tz).map_err(|e| {
                SyncError::configuration(format!(
                    "mapping '{}' has invalid backfill_start: {e}",
                    self.name
                ))
            })?;
        }
        Ok(())
    }
}

/// Mapping names become state keys and file names.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Checks a whole mapping list: each mapping individually plus unique names.
pub fn validate_mappings(mappings: &[Mapping], tz: Tz) -> Result<(), SyncError> {
    let mut names = HashSet::new();
    for mapping in mappings {
        mapping.validate(tz)?;
        if !names.insert(mapping.name.as_str()) {
            return Err(SyncError::configuration(format!(
                "duplicate mapping name '{}'",
                mapping.name
            )));
        }
    }
    Ok(())
}
