//! Error kinds of the sync engine and their retry classification.

use thiserror::Error;

/// Whether an operation that failed with an error is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid mapping or settings. Raised before any I/O for the mapping.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source and destination schemas cannot be reconciled without loss.
    #[error("Schema incompatible: {0}")]
    SchemaIncompatible(String),

    /// Connectivity, quota or lock contention on the source, destination or
    /// state store.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Retries exhausted, or an unrecoverable read or write error.
    #[error("Run failed: {0}")]
    RunFailed(String),

    /// The run was cancelled or timed out.
    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn transient(msg: impl std::fmt::Display) -> Self {
        Self::TransientIo(msg.to_string())
    }

    pub fn failed(msg: impl std::fmt::Display) -> Self {
        Self::RunFailed(msg.to_string())
    }

    pub fn configuration(msg: impl std::fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Default classification: only `TransientIo` is retried.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::TransientIo(_) => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        }
    }

    /// Short machine-friendly name, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::SchemaIncompatible(_) => "schema_incompatible",
            Self::TransientIo(_) => "transient_io",
            Self::RunFailed(_) => "run_failed",
            Self::Cancelled => "cancelled",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            SyncError::transient("connection reset").classify(),
            ErrorClass::Retryable
        );
        assert_eq!(SyncError::failed("boom").classify(), ErrorClass::Fatal);
        assert_eq!(SyncError::Cancelled.classify(), ErrorClass::Fatal);
        assert_eq!(
            SyncError::from(anyhow::anyhow!("unknown")).classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SyncError::configuration("upsert requires primary_keys").to_string(),
            "Configuration error: upsert requires primary_keys"
        );
    }
}
