//! Maps transport and engine failures onto the adapter's error taxonomy.
//!
//! Classification happens once, where a cursor talks to its transport; nothing is retried or
//! swallowed here.

use tracing::debug;

use crate::error::AdapterError;
use crate::transport::{EngineError, TransportError};

/// Message fragment that marks a failed connect regardless of which layer raised it.
pub const CONNECT_FAILURE_MARKER: &str = "Failed to establish a new connection";

/// Classify a transport failure, attaching `query_id` when the cursor already has one.
#[must_use]
pub fn classify(err: TransportError, query_id: Option<&str>) -> AdapterError {
    let message = err.to_string();
    if matches!(err, TransportError::Connect(_)) || message.contains(CONNECT_FAILURE_MARKER) {
        return AdapterError::Connectivity {
            message,
            source: Some(Box::new(err)),
        };
    }

    match err {
        TransportError::Http { .. } => {
            if let Some(id) = query_id {
                debug!("Presto query id: {id}");
            }
            debug!("Presto error: {message}");
            AdapterError::Query {
                message,
                query_id: query_id.map(str::to_string),
                error_name: None,
            }
        }
        other => AdapterError::UnknownRuntime {
            message,
            source: Some(Box::new(other)),
        },
    }
}

/// Classify a failure the engine reported inside a page of query `query_id`.
#[must_use]
pub fn classify_engine(err: EngineError, query_id: &str) -> AdapterError {
    debug!("Presto query id: {query_id}");
    debug!("Presto error: {}", err.message);
    if err.message.contains(CONNECT_FAILURE_MARKER) {
        return AdapterError::Connectivity {
            message: err.message,
            source: None,
        };
    }
    AdapterError::Query {
        message: err.message,
        query_id: Some(query_id.to_string()),
        error_name: err.error_name,
    }
}

/// Debug trail written when a statement fails, after classification.
pub(crate) fn log_failure(sql: &str, err: &AdapterError) {
    if err.kind() == crate::error::ErrorKind::UnknownRuntime {
        debug!("Error while running:\n{sql}");
    }
    debug!("{err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn connect_failures_are_connectivity() {
        let err = classify(TransportError::Connect("coordinator:8080".to_string()), None);
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.message().contains("coordinator:8080"));
    }

    #[test]
    fn marker_in_any_message_is_connectivity() {
        let raw = "HTTPConnectionPool(host='coordinator', port=8080): Max retries exceeded \
                   (Caused by NewConnectionError: Failed to establish a new connection: \
                   [Errno 111] Connection refused)";
        let err = classify(TransportError::Request(raw.to_string()), None);
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.message().contains(raw));
    }

    #[test]
    fn http_errors_are_query_errors_with_id() {
        let err = classify(
            TransportError::Http {
                status: 500,
                message: "internal error".to_string(),
            },
            Some("q1"),
        );
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.query_id(), Some("q1"));
    }

    #[test]
    fn decode_failures_are_runtime_errors() {
        let err = classify(TransportError::Decode("expected value".to_string()), Some("q1"));
        assert_eq!(err.kind(), ErrorKind::UnknownRuntime);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn engine_errors_keep_name_and_id() {
        let err = classify_engine(
            EngineError {
                message: "Table 'x' does not exist".to_string(),
                error_name: Some("TABLE_NOT_FOUND".to_string()),
                error_type: Some("USER_ERROR".to_string()),
                error_code: Some(46),
            },
            "q2",
        );
        match err {
            AdapterError::Query {
                message,
                query_id,
                error_name,
            } => {
                assert_eq!(message, "Table 'x' does not exist");
                assert_eq!(query_id.as_deref(), Some("q2"));
                assert_eq!(error_name.as_deref(), Some("TABLE_NOT_FOUND"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
