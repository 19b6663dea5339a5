use std::fmt;

use thiserror::Error;

/// Boxed underlying cause carried by some error kinds.
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Every failure the adapter surfaces to its caller.
///
/// Transport and engine failures are re-wrapped into exactly one of these variants at the
/// execute boundary (see [`crate::classify`]); the original message is kept verbatim and the
/// query id is attached whenever the cursor knew one.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Connectivity error: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Database error: {message}")]
    Query {
        message: String,
        query_id: Option<String>,
        error_name: Option<String>,
    },

    #[error(
        "Tried to run an empty query on model '{unit}'. If you are conditionally running\nsql, eg. in a model hook, make sure your `else` clause contains valid sql!\n\nProvided SQL:\n{sql}"
    )]
    EmptyScript { unit: String, sql: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot escape {0}")]
    UnsupportedParameterType(String),

    #[error("Statement has {placeholders} placeholder(s) but {supplied} parameter(s) were supplied")]
    ParameterCountMismatch { placeholders: usize, supplied: usize },

    #[error("Runtime error: {message}")]
    UnknownRuntime {
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

/// Stable, payload-free view of [`AdapterError`] for callers that branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Query,
    EmptyScript,
    Configuration,
    UnsupportedParameterType,
    ParameterCountMismatch,
    UnknownRuntime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connectivity => write!(f, "CONNECTIVITY"),
            ErrorKind::Query => write!(f, "QUERY"),
            ErrorKind::EmptyScript => write!(f, "EMPTY_SCRIPT"),
            ErrorKind::Configuration => write!(f, "CONFIGURATION"),
            ErrorKind::UnsupportedParameterType => write!(f, "UNSUPPORTED_PARAMETER_TYPE"),
            ErrorKind::ParameterCountMismatch => write!(f, "PARAMETER_COUNT_MISMATCH"),
            ErrorKind::UnknownRuntime => write!(f, "UNKNOWN_RUNTIME"),
        }
    }
}

impl AdapterError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Connectivity { .. } => ErrorKind::Connectivity,
            AdapterError::Query { .. } => ErrorKind::Query,
            AdapterError::EmptyScript { .. } => ErrorKind::EmptyScript,
            AdapterError::Configuration(_) => ErrorKind::Configuration,
            AdapterError::UnsupportedParameterType(_) => ErrorKind::UnsupportedParameterType,
            AdapterError::ParameterCountMismatch { .. } => ErrorKind::ParameterCountMismatch,
            AdapterError::UnknownRuntime { .. } => ErrorKind::UnknownRuntime,
        }
    }

    /// Server-assigned query id, when the failing statement had one.
    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        match self {
            AdapterError::Query { query_id, .. } => query_id.as_deref(),
            _ => None,
        }
    }

    /// The original, unprefixed message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            AdapterError::Connectivity { message, .. }
            | AdapterError::Query { message, .. }
            | AdapterError::UnknownRuntime { message, .. }
            | AdapterError::Configuration(message) => message.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        AdapterError::UnknownRuntime {
            message: message.into(),
            source: None,
        }
    }
}
