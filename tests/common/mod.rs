#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use presto_adapter::prelude::*;
use presto_adapter::transport::{Column, EngineError};
use serde_json::Value as JsonValue;
use tokio::sync::Notify;

/// Every call a [`ScriptedTransport`] saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start {
        sql: String,
        transaction_id: Option<String>,
    },
    Advance(String),
    Cancel(String),
    Close,
}

/// Pause point inside `advance` for a continuation, so a test can act while a query runs.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory transport answering from queued pages.
///
/// `start` pops the next queued first page, or answers with an empty finished page when the
/// queue is empty. `advance` answers from the pages registered per continuation.
#[derive(Default)]
pub struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    first_pages: Mutex<VecDeque<Result<QueryPage, TransportError>>>,
    continuations: Mutex<HashMap<String, QueryPage>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    cancelled: AtomicBool,
    counter: AtomicUsize,
    last_query_id: Mutex<Option<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_start(&self, page: QueryPage) {
        self.first_pages.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_start_error(&self, err: TransportError) {
        self.first_pages.lock().unwrap().push_back(Err(err));
    }

    pub fn on_advance(&self, next_uri: &str, page: QueryPage) {
        self.continuations
            .lock()
            .unwrap()
            .insert(next_uri.to_string(), page);
    }

    pub fn gate(&self, next_uri: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(next_uri.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// SQL texts sent through `start`, in order.
    pub fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start(&self, sql: &str, ctx: &RequestContext) -> Result<QueryPage, TransportError> {
        self.record(Call::Start {
            sql: sql.to_string(),
            transaction_id: ctx.transaction_id.clone(),
        });
        let queued = self.first_pages.lock().unwrap().pop_front();
        let outcome = queued.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(finished(&format!("auto_{n}")))
        });
        if let Ok(page) = &outcome {
            *self.last_query_id.lock().unwrap() = Some(page.id.clone());
        }
        outcome
    }

    async fn advance(
        &self,
        next_uri: &str,
        _ctx: &RequestContext,
    ) -> Result<QueryPage, TransportError> {
        self.record(Call::Advance(next_uri.to_string()));
        let gate = self.gates.lock().unwrap().get(next_uri).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let page = self.continuations.lock().unwrap().remove(next_uri);
        match page {
            Some(page) => Ok(page),
            None if self.cancelled.load(Ordering::SeqCst) => {
                let id = self.last_query_id.lock().unwrap().clone().unwrap_or_default();
                let mut page = finished(&id);
                page.error = Some(EngineError {
                    message: "Query was canceled".to_string(),
                    error_name: Some("USER_CANCELED".to_string()),
                    error_type: Some("USER_ERROR".to_string()),
                    error_code: Some(3),
                });
                Ok(page)
            }
            None => Err(TransportError::Http {
                status: 404,
                message: format!("unknown continuation {next_uri}"),
            }),
        }
    }

    async fn cancel(&self, next_uri: &str) -> Result<(), TransportError> {
        self.record(Call::Cancel(next_uri.to_string()));
        self.cancelled.store(true, Ordering::SeqCst);
        self.continuations.lock().unwrap().remove(next_uri);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Connector handing out one shared [`ScriptedTransport`] and counting connect attempts.
pub struct ScriptedConnector {
    pub transport: Arc<ScriptedTransport>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(transport: Arc<ScriptedTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn Transport>, AdapterError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.transport.clone() as Arc<dyn Transport>)
    }
}

/// Connector whose every attempt fails the way an unreachable coordinator does.
pub struct UnreachableConnector;

impl Connector for UnreachableConnector {
    fn connect(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn Transport>, AdapterError> {
        Ok(Arc::new(UnreachableTransport))
    }
}

pub struct UnreachableTransport;

#[async_trait]
impl Transport for UnreachableTransport {
    async fn start(&self, _sql: &str, _ctx: &RequestContext) -> Result<QueryPage, TransportError> {
        Err(TransportError::Connect(
            "coordinator:8080 ([Errno 111] Connection refused)".to_string(),
        ))
    }

    async fn advance(
        &self,
        _next_uri: &str,
        _ctx: &RequestContext,
    ) -> Result<QueryPage, TransportError> {
        Err(TransportError::Closed)
    }

    async fn cancel(&self, _next_uri: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub fn finished(id: &str) -> QueryPage {
    QueryPage {
        id: id.to_string(),
        ..QueryPage::default()
    }
}

pub fn running(id: &str, next_uri: &str) -> QueryPage {
    QueryPage {
        id: id.to_string(),
        next_uri: Some(next_uri.to_string()),
        ..QueryPage::default()
    }
}

pub fn with_rows(mut page: QueryPage, columns: &[(&str, &str)], rows: Vec<Vec<JsonValue>>) -> QueryPage {
    page.columns = Some(
        columns
            .iter()
            .map(|(name, type_name)| Column {
                name: (*name).to_string(),
                type_name: (*type_name).to_string(),
            })
            .collect(),
    );
    page.data = Some(rows);
    page
}

pub fn credentials() -> Credentials {
    Credentials::new("coordinator", 8080, "etl")
        .with_catalog("hive")
        .with_schema("analytics")
}

/// A manager over a fresh scripted transport, plus a closed connection named `model.orders`.
pub fn setup() -> (ConnectionManager, Arc<ScriptedConnector>, Connection) {
    let connector = ScriptedConnector::new(ScriptedTransport::new());
    let manager = ConnectionManager::new(connector.clone());
    let conn = Connection::new("model.orders", credentials());
    (manager, connector, conn)
}
