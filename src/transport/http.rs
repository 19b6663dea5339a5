//! Presto REST statement protocol over reqwest.
//!
//! `POST /v1/statement` submits, `GET nextUri` pages, `DELETE nextUri` cancels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::{Connector, QueryPage, RequestContext, Transport, TransportError};
use crate::config::{BasicAuth, ConnectionSettings, SslVerify};
use crate::error::AdapterError;

const STATEMENT_PATH: &str = "/v1/statement";

pub const USER_HEADER: &str = "X-Presto-User";
pub const CATALOG_HEADER: &str = "X-Presto-Catalog";
pub const SCHEMA_HEADER: &str = "X-Presto-Schema";
pub const SOURCE_HEADER: &str = "X-Presto-Source";
pub const TRANSACTION_HEADER: &str = "X-Presto-Transaction-Id";
pub const STARTED_TRANSACTION_HEADER: &str = "X-Presto-Started-Transaction-Id";
pub const CLEAR_TRANSACTION_HEADER: &str = "X-Presto-Clear-Transaction-Id";

/// Session against one coordinator.
pub struct HttpTransport {
    client: Client,
    statement_url: String,
    settings: ConnectionSettings,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Build the HTTP client; no request is made until the first statement.
    ///
    /// # Errors
    /// `Configuration` when the CA bundle cannot be read or parsed, or the client cannot be
    /// built.
    pub fn new(settings: ConnectionSettings) -> Result<Self, AdapterError> {
        let mut builder = Client::builder();
        match &settings.ssl_verify {
            SslVerify::Flag(true) => {}
            SslVerify::Flag(false) => {
                warn!("[PRESTO_HTTP] TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            SslVerify::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    AdapterError::Configuration(format!(
                        "cannot read CA bundle {}: {e}",
                        path.display()
                    ))
                })?;
                let certificate = Certificate::from_pem(&pem).map_err(|e| {
                    AdapterError::Configuration(format!(
                        "invalid CA bundle {}: {e}",
                        path.display()
                    ))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
        }
        let client = builder
            .build()
            .map_err(|e| AdapterError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            statement_url: format!("{}{STATEMENT_PATH}", settings.base_url()),
            settings,
            closed: AtomicBool::new(false),
        })
    }

    fn decorate(&self, mut request: RequestBuilder, ctx: &RequestContext) -> RequestBuilder {
        request = request
            .header(USER_HEADER, &self.settings.user)
            .header(SOURCE_HEADER, &self.settings.source);
        if let Some(catalog) = &self.settings.catalog {
            request = request.header(CATALOG_HEADER, catalog);
        }
        if let Some(schema) = &self.settings.schema {
            request = request.header(SCHEMA_HEADER, schema);
        }
        if let Some(transaction_id) = &ctx.transaction_id {
            request = request.header(TRANSACTION_HEADER, transaction_id);
        }
        for (name, value) in &self.settings.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(BasicAuth { username, password }) = &self.settings.basic_auth {
            request = request.basic_auth(username, Some(password));
        }
        request
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, label: &str) -> Result<QueryPage, TransportError> {
        let started = Instant::now();
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        debug!(
            "[PRESTO_HTTP] {label} status={status} duration_ms={}",
            started.elapsed().as_millis()
        );
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let started_transaction_id = header_value(&response, STARTED_TRANSACTION_HEADER);
        let cleared_transaction = response.headers().contains_key(CLEAR_TRANSACTION_HEADER);
        let mut page: QueryPage = response.json().await.map_err(|e| {
            if e.is_decode() {
                TransportError::Decode(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;
        page.started_transaction_id = started_transaction_id;
        page.cleared_transaction = cleared_transaction;
        Ok(page)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, sql: &str, ctx: &RequestContext) -> Result<QueryPage, TransportError> {
        self.ensure_open()?;
        let request = self
            .decorate(self.client.post(&self.statement_url), ctx)
            .body(sql.to_string());
        self.send(request, "POST").await
    }

    async fn advance(
        &self,
        next_uri: &str,
        ctx: &RequestContext,
    ) -> Result<QueryPage, TransportError> {
        self.ensure_open()?;
        let request = self.decorate(self.client.get(next_uri), ctx);
        self.send(request, "GET").await
    }

    async fn cancel(&self, next_uri: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let request = self.decorate(self.client.delete(next_uri), &RequestContext::default());
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        debug!("[PRESTO_HTTP] DELETE status={status}");
        // the query may have finished or been purged already
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Connects over HTTP(S); the default [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn Transport>, AdapterError> {
        Ok(Arc::new(HttpTransport::new(settings.clone())?))
    }
}

fn map_send_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        warn!("[PRESTO_HTTP] Connect failed: {err}");
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

async fn error_from_response(response: Response) -> TransportError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = match serde_json::from_str::<QueryPage>(&text) {
        Ok(QueryPage {
            error: Some(error), ..
        }) => error.message,
        _ => text,
    };
    warn!("[PRESTO_HTTP] Server error: status={status} message=\"{message}\"");
    TransportError::Http {
        status: status.as_u16(),
        message,
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
