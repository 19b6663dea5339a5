//! The seam between the adapter and the engine's client protocol.
//!
//! Everything above this module only shapes SQL text and interprets [`QueryPage`]s; how a page
//! is fetched is up to the [`Transport`] implementation. [`http::HttpTransport`] (feature
//! `http`) speaks Presto's REST statement protocol.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::ConnectionSettings;
use crate::error::AdapterError;

#[cfg(feature = "http")]
pub mod http;

/// Marker transaction id announcing that the client is able to start a transaction.
pub const NO_TRANSACTION: &str = "NONE";

/// Failures raised by a transport before the adapter classifies them.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to establish a new connection: {0}")]
    Connect(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid server response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Transport is closed")]
    Closed,
}

/// Request-scoped state attached to every call made on behalf of a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// `None` under autocommit; [`NO_TRANSACTION`] while starting one; the server's id after.
    pub transaction_id: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn in_transaction(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
        }
    }
}

/// Column metadata as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Query-level failure reported inside a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineError {
    pub message: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

/// One response of the statement protocol.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// Server-assigned query id.
    pub id: String,
    /// Continuation for the next page; absent once the query has finished.
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    #[serde(default)]
    pub data: Option<Vec<Vec<JsonValue>>>,
    #[serde(default)]
    pub update_type: Option<String>,
    #[serde(default)]
    pub update_count: Option<i64>,
    #[serde(default)]
    pub error: Option<EngineError>,
    /// Set from response headers, not the body.
    #[serde(skip)]
    pub started_transaction_id: Option<String>,
    #[serde(skip)]
    pub cleared_transaction: bool,
}

impl QueryPage {
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.next_uri.is_none()
    }
}

/// Client protocol used by cursors.
///
/// Implementations are shared between a connection's cursors and its cancel handles, so every
/// method takes `&self`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit `sql` and return the first page.
    async fn start(&self, sql: &str, ctx: &RequestContext) -> Result<QueryPage, TransportError>;

    /// Follow a continuation returned by a previous page.
    async fn advance(
        &self,
        next_uri: &str,
        ctx: &RequestContext,
    ) -> Result<QueryPage, TransportError>;

    /// Ask the engine to cancel the query behind `next_uri`. Must not wait for the query to
    /// wind down.
    async fn cancel(&self, next_uri: &str) -> Result<(), TransportError>;

    /// Release the session. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a transport from validated settings.
pub trait Connector: Send + Sync {
    /// # Errors
    /// Returns `AdapterError::Configuration` when the settings cannot be applied (for example an
    /// unreadable CA bundle).
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn Transport>, AdapterError>;
}
