//! Classification of BigQuery API failures.
//!
//! The client reports HTTP and job errors as text, so classification works
//! on the rendered message.

use gcp_bigquery_client::error::BQError;
use sync_engine::SyncError;

/// Rate limits, quota pushback, server-side errors and transport failures.
const TRANSIENT_MARKERS: &[&str] = &[
    "rateLimitExceeded",
    "jobRateLimitExceeded",
    "quotaExceeded",
    "backendError",
    "internalError",
    "serviceUnavailable",
    "code: 429",
    "code: 500",
    "code: 502",
    "code: 503",
    "code: 504",
    "Request error",
    "connection reset",
    "timed out",
];

/// Missing datasets, tables or permissions: retrying won't help and the
/// fix is in configuration.
const CONFIGURATION_MARKERS: &[&str] = &[
    "notFound",
    "Not found:",
    "accessDenied",
    "Access Denied",
    "code: 401",
];

pub fn classify_bigquery_error(err: BQError) -> SyncError {
    classify_message(&err.to_string())
}

pub(crate) fn classify_message(message: &str) -> SyncError {
    let message = format!("BigQuery error: {message}");
    if TRANSIENT_MARKERS.iter().any(|m| message.contains(m)) {
        SyncError::transient(message)
    } else if CONFIGURATION_MARKERS.iter().any(|m| message.contains(m)) {
        SyncError::configuration(message)
    } else {
        SyncError::failed(message)
    }
}
