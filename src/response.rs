use std::fmt;

use serde::Serialize;

use crate::cursor::Cursor;

/// Rows-affected value used when the engine reports no count.
pub const ROWS_AFFECTED_UNKNOWN: i64 = -1;

/// Outcome of one executed statement, as surfaced to the orchestrator for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterResponse {
    #[serde(rename = "_message")]
    pub message: String,
    pub query: String,
    pub query_id: String,
    pub rows_affected: i64,
}

impl AdapterResponse {
    /// Build the response for the statement a cursor last ran.
    #[must_use]
    pub fn from_cursor(cursor: &Cursor) -> Self {
        Self {
            message: "SUCCESS".to_string(),
            query: cursor.query().unwrap_or_default().to_string(),
            query_id: cursor.query_id().unwrap_or_default().to_string(),
            rows_affected: cursor.rowcount(),
        }
    }
}

impl fmt::Display for AdapterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows_affected == ROWS_AFFECTED_UNKNOWN {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}", self.message, self.rows_affected)
        }
    }
}
