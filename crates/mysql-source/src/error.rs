//! Mapping of driver errors onto the engine's error kinds.

use mysql_async::Error as MySqlError;
use sync_engine::SyncError;

/// Server error codes worth retrying.
const TRANSIENT_SERVER_CODES: &[u16] = &[
    1040, // ER_CON_COUNT_ERROR: too many connections
    1053, // ER_SERVER_SHUTDOWN
    1205, // ER_LOCK_WAIT_TIMEOUT
    1213, // ER_LOCK_DEADLOCK
    1927, // ER_CONNECTION_KILLED
    3024, // ER_QUERY_TIMEOUT (max_execution_time)
];

/// Server error codes that mean the mapping points at something that
/// isn't there.
const CONFIGURATION_SERVER_CODES: &[u16] = &[
    1044, // ER_DBACCESS_DENIED_ERROR
    1045, // ER_ACCESS_DENIED_ERROR
    1049, // ER_BAD_DB_ERROR
    1054, // ER_BAD_FIELD_ERROR
    1146, // ER_NO_SUCH_TABLE
];

pub fn classify_mysql_error(err: MySqlError) -> SyncError {
    match err {
        MySqlError::Io(e) => SyncError::transient(format!("MySQL I/O error: {e}")),
        MySqlError::Driver(e) => SyncError::transient(format!("MySQL driver error: {e}")),
        MySqlError::Server(e) => classify_server_error(e.code, &e.message),
        MySqlError::Url(e) => SyncError::configuration(format!("Invalid MySQL URI: {e}")),
        other => SyncError::failed(format!("MySQL error: {other}")),
    }
}

pub(crate) fn classify_server_error(code: u16, message: &str) -> SyncError {
    let message = format!("MySQL server error {code}: {message}");
    if TRANSIENT_SERVER_CODES.contains(&code) {
        SyncError::transient(message)
    } else if CONFIGURATION_SERVER_CODES.contains(&code) {
        SyncError::configuration(message)
    } else {
        SyncError::failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_engine::ErrorClass;

    #[test]
    fn test_lock_contention_is_retryable() {
        for code in [1205, 1213] {
            let err = classify_server_error(code, "try restarting transaction");
            assert_eq!(err.classify(), ErrorClass::Retryable, "code {code}");
        }
    }

    #[test]
    fn test_missing_table_is_configuration() {
        let err = classify_server_error(1146, "Table 'shop.ghost' doesn't exist");
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("1146"));
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = classify_server_error(1064, "You have an error in your SQL syntax");
        assert_eq!(err.kind(), "run_failed");
        assert_eq!(err.classify(), ErrorClass::Fatal);
    }
}
