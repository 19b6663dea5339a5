//! Statement execution against a transport, with buffered results and out-of-band cancel.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::classify::{classify, classify_engine, log_failure};
use crate::error::AdapterError;
use crate::params::LiteralParams;
use crate::response::{AdapterResponse, ROWS_AFFECTED_UNKNOWN};
use crate::results::{ResultSet, build_result_set};
use crate::sql::bind_literals;
use crate::transport::{Column, QueryPage, RequestContext, Transport};
use crate::types::RowValues;

#[derive(Debug, Default)]
struct SlotState {
    running: bool,
    query_id: Option<String>,
    next_uri: Option<String>,
    cancel_requested: bool,
}

/// The query currently running on a connection, shared with its [`CancelHandle`]s.
///
/// The lock is only held to copy values in or out, never across an await.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlightSlot(Arc<Mutex<SlotState>>);

impl InFlightSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // state is plain data; a panic elsewhere cannot leave it inconsistent
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn begin(&self) {
        *self.lock() = SlotState {
            running: true,
            ..SlotState::default()
        };
    }

    fn publish(&self, query_id: &str, next_uri: Option<&str>) {
        let mut state = self.lock();
        state.query_id = Some(query_id.to_string());
        state.next_uri = next_uri.map(str::to_string);
    }

    fn finish(&self) {
        *self.lock() = SlotState::default();
    }

    fn cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Mark the running query as cancelled and return its continuation, if it has one.
    fn request_cancel(&self) -> Option<(Option<String>, Option<String>)> {
        let mut state = self.lock();
        if !state.running {
            return None;
        }
        state.cancel_requested = true;
        Some((state.query_id.clone(), state.next_uri.clone()))
    }

    fn query_id(&self) -> Option<String> {
        self.lock().query_id.clone()
    }
}

/// Cancels whatever statement is running on the connection it came from.
///
/// Cloneable and `Send`, so a watchdog task can hold one while another task awaits
/// [`Cursor::execute`]. Cancelling never waits for the query to wind down.
#[derive(Clone)]
pub struct CancelHandle {
    transport: Arc<dyn Transport>,
    slot: InFlightSlot,
}

impl CancelHandle {
    pub(crate) fn new(transport: Arc<dyn Transport>, slot: InFlightSlot) -> Self {
        Self { transport, slot }
    }

    /// Request cancellation of the in-flight statement; a no-op when nothing is running.
    ///
    /// # Errors
    /// Returns the classified transport error if the cancel request itself fails.
    pub async fn cancel(&self) -> Result<(), AdapterError> {
        let Some((query_id, next_uri)) = self.slot.request_cancel() else {
            debug!("No query in flight; cancel is a no-op");
            return Ok(());
        };
        let Some(next_uri) = next_uri else {
            // the executing cursor sees the flag and cancels once a continuation exists
            return Ok(());
        };
        debug!("Cancelling Presto query {}", query_id.as_deref().unwrap_or("<pending>"));
        self.transport
            .cancel(&next_uri)
            .await
            .map_err(|e| classify(e, query_id.as_deref()))
    }

    /// Id of the statement currently running, if any.
    #[must_use]
    pub fn query_id(&self) -> Option<String> {
        self.slot.query_id()
    }
}

/// Per-statement handle: runs SQL, buffers the full result, and records what it ran.
///
/// The accessors (`query`, `query_id`, `description`, `rowcount`, `update_type`) are the
/// complete set of cursor attributes exposed to callers.
pub struct Cursor {
    transport: Option<Arc<dyn Transport>>,
    context: RequestContext,
    in_flight: InFlightSlot,
    query: Option<String>,
    query_id: Option<String>,
    columns: Option<Vec<Column>>,
    rows_affected: i64,
    update_type: Option<String>,
    started_transaction_id: Option<String>,
    cleared_transaction: bool,
    buffer: Option<ResultSet>,
}

impl Cursor {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        context: RequestContext,
        in_flight: InFlightSlot,
    ) -> Self {
        Self {
            transport: Some(transport),
            context,
            in_flight,
            query: None,
            query_id: None,
            columns: None,
            rows_affected: ROWS_AFFECTED_UNKNOWN,
            update_type: None,
            started_transaction_id: None,
            cleared_transaction: false,
            buffer: None,
        }
    }

    /// Execute `sql`, substituting `params` for `?` placeholders when given, and buffer every
    /// result row before returning.
    ///
    /// # Errors
    /// Parameter problems fail before anything is sent. Transport and engine failures are
    /// classified into `AdapterError`, carrying the query id when one was assigned.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: Option<&[RowValues]>,
    ) -> Result<AdapterResponse, AdapterError> {
        let transport = self
            .transport
            .clone()
            .ok_or_else(|| AdapterError::runtime("Cursor is closed"))?;

        let sql = match params {
            Some(params) => {
                let literals = LiteralParams::convert(params)?;
                bind_literals(sql, literals.as_slice())?
            }
            None => sql.to_string(),
        };

        self.reset();
        self.query = Some(sql.clone());
        self.in_flight.begin();
        let outcome = self.run(transport.as_ref(), &sql).await;
        self.in_flight.finish();

        match outcome {
            Ok(result_set) => {
                self.buffer = Some(result_set);
                Ok(AdapterResponse::from_cursor(self))
            }
            Err(err) => {
                log_failure(&sql, &err);
                Err(err)
            }
        }
    }

    async fn run(&mut self, transport: &dyn Transport, sql: &str) -> Result<ResultSet, AdapterError> {
        let mut page = transport
            .start(sql, &self.context)
            .await
            .map_err(|e| classify(e, None))?;
        let mut data: Vec<Vec<JsonValue>> = Vec::new();

        loop {
            let next_uri = self.absorb(&mut page, &mut data)?;
            let Some(next_uri) = next_uri else {
                break;
            };
            if self.in_flight.cancel_requested() {
                return Err(self.cancel_now(transport, &next_uri).await);
            }
            page = transport
                .advance(&next_uri, &self.context)
                .await
                .map_err(|e| classify(e, self.query_id.as_deref()))?;
        }

        build_result_set(self.columns.as_deref().unwrap_or_default(), data)
    }

    /// Fold one page into the cursor state and return its continuation.
    fn absorb(
        &mut self,
        page: &mut QueryPage,
        data: &mut Vec<Vec<JsonValue>>,
    ) -> Result<Option<String>, AdapterError> {
        if self.query_id.is_none() {
            debug!("Presto query id: {}", page.id);
        }
        self.query_id = Some(page.id.clone());
        self.in_flight.publish(&page.id, page.next_uri.as_deref());

        if let Some(error) = page.error.take() {
            return Err(classify_engine(error, &page.id));
        }
        if self.columns.is_none() {
            self.columns = page.columns.take();
        }
        if let Some(rows) = page.data.take() {
            data.extend(rows);
        }
        if let Some(count) = page.update_count {
            self.rows_affected = count;
        }
        if page.update_type.is_some() {
            self.update_type = page.update_type.take();
        }
        if page.started_transaction_id.is_some() {
            self.started_transaction_id = page.started_transaction_id.take();
        }
        self.cleared_transaction |= page.cleared_transaction;

        Ok(page.next_uri.take())
    }

    async fn cancel_now(&self, transport: &dyn Transport, next_uri: &str) -> AdapterError {
        let query_id = self.query_id.clone();
        if let Err(err) = transport.cancel(next_uri).await {
            return classify(err, query_id.as_deref());
        }
        AdapterError::Query {
            message: "Query was cancelled".to_string(),
            query_id,
            error_name: Some("USER_CANCELED".to_string()),
        }
    }

    fn reset(&mut self) {
        self.query = None;
        self.query_id = None;
        self.columns = None;
        self.rows_affected = ROWS_AFFECTED_UNKNOWN;
        self.update_type = None;
        self.started_transaction_id = None;
        self.cleared_transaction = false;
        self.buffer = None;
    }

    /// Take the buffered rows of the last execute.
    ///
    /// Returns `None` before any execute and on every call after the first.
    pub fn fetch(&mut self) -> Option<ResultSet> {
        self.buffer.take()
    }

    /// Cancel the statement running on this cursor's connection, if any.
    ///
    /// # Errors
    /// Returns the classified transport error if the cancel request fails.
    pub async fn cancel(&self) -> Result<(), AdapterError> {
        match self.cancel_handle() {
            Some(handle) => handle.cancel().await,
            None => Ok(()),
        }
    }

    /// Handle that can cancel this cursor's statements from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.transport
            .as_ref()
            .map(|t| CancelHandle::new(Arc::clone(t), self.in_flight.clone()))
    }

    /// Drop this cursor's transport handle and buffer. Idempotent.
    pub fn close(&mut self) {
        self.transport = None;
        self.buffer = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// SQL text of the last execute, after parameter substitution.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// Column metadata of the last result, if the statement produced columns.
    #[must_use]
    pub fn description(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    /// Rows affected as reported by the engine, or `-1`.
    #[must_use]
    pub fn rowcount(&self) -> i64 {
        self.rows_affected
    }

    /// Statement kind reported by the engine (`INSERT`, `CREATE TABLE`, ...).
    #[must_use]
    pub fn update_type(&self) -> Option<&str> {
        self.update_type.as_deref()
    }

    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub(crate) fn started_transaction_id(&self) -> Option<&str> {
        self.started_transaction_id.as_deref()
    }

    pub(crate) fn cleared_transaction(&self) -> bool {
        self.cleared_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{EngineError, TransportError};
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Engine {}

        #[async_trait]
        impl Transport for Engine {
            async fn start(&self, sql: &str, ctx: &RequestContext) -> Result<QueryPage, TransportError>;
            async fn advance(&self, next_uri: &str, ctx: &RequestContext) -> Result<QueryPage, TransportError>;
            async fn cancel(&self, next_uri: &str) -> Result<(), TransportError>;
            async fn close(&self) -> Result<(), TransportError>;
        }
    }

    fn page(id: &str, next: Option<&str>) -> QueryPage {
        QueryPage {
            id: id.to_string(),
            next_uri: next.map(str::to_string),
            ..QueryPage::default()
        }
    }

    fn cursor(transport: MockEngine) -> Cursor {
        Cursor::new(
            Arc::new(transport),
            RequestContext::default(),
            InFlightSlot::default(),
        )
    }

    #[tokio::test]
    async fn drains_all_pages_before_returning() {
        let mut transport = MockEngine::new();
        transport.expect_start().times(1).returning(|_, _| {
            let mut first = page("q1", Some("http://c/v1/statement/q1/1"));
            first.columns = Some(vec![Column {
                name: "n".to_string(),
                type_name: "bigint".to_string(),
            }]);
            first.data = Some(vec![vec![json!(1)]]);
            Ok(first)
        });
        transport
            .expect_advance()
            .withf(|uri, _| uri == "http://c/v1/statement/q1/1")
            .times(1)
            .returning(|_, _| {
                let mut last = page("q1", None);
                last.data = Some(vec![vec![json!(2)]]);
                Ok(last)
            });

        let mut cursor = cursor(transport);
        let response = cursor.execute("select n from t", None).await.unwrap();
        assert_eq!(response.message, "SUCCESS");
        assert_eq!(response.query_id, "q1");
        assert_eq!(response.rows_affected, -1);

        let rows = cursor.fetch().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.results[1].get("n"), Some(&RowValues::Int(2)));
        assert!(cursor.fetch().is_none());
    }

    #[tokio::test]
    async fn substitutes_parameters_before_sending() {
        let mut transport = MockEngine::new();
        transport
            .expect_start()
            .withf(|sql, _| sql == "select * from t where name = 'O''Brien' and id = 3")
            .times(1)
            .returning(|_, _| Ok(page("q1", None)));

        let mut cursor = cursor(transport);
        cursor
            .execute(
                "select * from t where name = ? and id = ?",
                Some(&[RowValues::Text("O'Brien".into()), RowValues::Int(3)]),
            )
            .await
            .unwrap();
        assert_eq!(
            cursor.query(),
            Some("select * from t where name = 'O''Brien' and id = 3")
        );
    }

    #[tokio::test]
    async fn parameter_errors_never_reach_the_transport() {
        let mut transport = MockEngine::new();
        transport.expect_start().times(0);

        let mut cursor = cursor(transport);
        let err = cursor
            .execute("select ?", Some(&[RowValues::Int(1), RowValues::Int(2)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterCountMismatch);

        let err = cursor
            .execute("select ?", Some(&[RowValues::Blob(vec![0])]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameterType);
    }

    #[tokio::test]
    async fn engine_errors_carry_query_id() {
        let mut transport = MockEngine::new();
        transport.expect_start().returning(|_, _| {
            let mut failed = page("q9", None);
            failed.error = Some(EngineError {
                message: "line 1:1: mismatched input".to_string(),
                error_name: Some("SYNTAX_ERROR".to_string()),
                error_type: Some("USER_ERROR".to_string()),
                error_code: Some(1),
            });
            Ok(failed)
        });

        let mut cursor = cursor(transport);
        let err = cursor.execute("selec 1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.query_id(), Some("q9"));
        assert!(cursor.fetch().is_none());
    }

    #[tokio::test]
    async fn reports_update_counts() {
        let mut transport = MockEngine::new();
        transport.expect_start().returning(|_, _| {
            let mut done = page("q2", None);
            done.update_type = Some("INSERT".to_string());
            done.update_count = Some(5);
            Ok(done)
        });

        let mut cursor = cursor(transport);
        let response = cursor.execute("insert into t select 1", None).await.unwrap();
        assert_eq!(response.rows_affected, 5);
        assert_eq!(cursor.update_type(), Some("INSERT"));
        assert_eq!(cursor.rowcount(), 5);
    }

    #[tokio::test]
    async fn cancel_without_query_is_a_no_op() {
        let mut transport = MockEngine::new();
        transport.expect_cancel().times(0);

        let cursor = cursor(transport);
        cursor.cancel().await.unwrap();
        assert!(cursor.cancel_handle().unwrap().query_id().is_none());
    }

    #[tokio::test]
    async fn closed_cursor_refuses_to_execute() {
        let mut transport = MockEngine::new();
        transport.expect_start().times(0);

        let mut cursor = cursor(transport);
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        let err = cursor.execute("select 1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRuntime);
        cursor.cancel().await.unwrap();
    }
}
