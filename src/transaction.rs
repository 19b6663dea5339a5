//! Per-connection transaction state.
//!
//! Under autocommit every hook is a no-op. Otherwise a transaction is started on the engine the
//! first time a cursor needs one, and its id travels with every later request of the connection.

use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::{Cursor, InFlightSlot};
use crate::error::AdapterError;
use crate::transport::{NO_TRANSACTION, RequestContext, Transport};

/// Isolation level requested for the connection's transactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Every statement commits on its own; no transaction is ever started.
    #[default]
    Autocommit,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling, or `None` for autocommit.
    #[must_use]
    pub fn as_sql(self) -> Option<&'static str> {
        match self {
            IsolationLevel::Autocommit => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    NoTransaction,
    TransactionOpen,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::NoTransaction => write!(f, "no transaction"),
            TransactionState::TransactionOpen => write!(f, "transaction open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionController {
    isolation_level: IsolationLevel,
    state: TransactionState,
    context: RequestContext,
}

impl TransactionController {
    #[must_use]
    pub fn new(isolation_level: IsolationLevel) -> Self {
        Self {
            isolation_level,
            state: TransactionState::NoTransaction,
            context: RequestContext::default(),
        }
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.isolation_level == IsolationLevel::Autocommit
    }

    /// Server transaction id, while one is open.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        match self.state {
            TransactionState::TransactionOpen => self.context.transaction_id.as_deref(),
            TransactionState::NoTransaction => None,
        }
    }

    /// Start a transaction unless running under autocommit or one is already open.
    ///
    /// # Errors
    /// Propagates the classified failure of `START TRANSACTION`, or `UnknownRuntime` if the
    /// engine accepted the statement without returning a transaction id.
    pub(crate) async fn begin(
        &mut self,
        transport: &Arc<dyn Transport>,
        in_flight: &InFlightSlot,
    ) -> Result<(), AdapterError> {
        let Some(level) = self.isolation_level.as_sql() else {
            return Ok(());
        };
        if self.state == TransactionState::TransactionOpen {
            return Ok(());
        }

        let mut cursor = Cursor::new(
            Arc::clone(transport),
            RequestContext::in_transaction(NO_TRANSACTION),
            in_flight.clone(),
        );
        cursor
            .execute(
                &format!("START TRANSACTION ISOLATION LEVEL {level}, READ WRITE"),
                None,
            )
            .await?;

        let transaction_id = cursor.started_transaction_id().ok_or_else(|| {
            AdapterError::runtime("START TRANSACTION did not return a transaction id")
        })?;
        debug!("Started transaction {transaction_id}");
        self.context = RequestContext::in_transaction(transaction_id);
        self.state = TransactionState::TransactionOpen;
        Ok(())
    }

    /// # Errors
    /// Propagates the classified failure of `COMMIT`.
    pub(crate) async fn commit(
        &mut self,
        transport: &Arc<dyn Transport>,
        in_flight: &InFlightSlot,
    ) -> Result<(), AdapterError> {
        self.finish("COMMIT", transport, in_flight).await
    }

    /// # Errors
    /// Propagates the classified failure of `ROLLBACK`.
    pub(crate) async fn rollback(
        &mut self,
        transport: &Arc<dyn Transport>,
        in_flight: &InFlightSlot,
    ) -> Result<(), AdapterError> {
        self.finish("ROLLBACK", transport, in_flight).await
    }

    async fn finish(
        &mut self,
        sql: &str,
        transport: &Arc<dyn Transport>,
        in_flight: &InFlightSlot,
    ) -> Result<(), AdapterError> {
        if self.state != TransactionState::TransactionOpen {
            return Ok(());
        }
        let mut cursor = Cursor::new(Arc::clone(transport), self.context.clone(), in_flight.clone());
        let outcome = cursor.execute(sql, None).await;
        // the engine drops the transaction on failure too
        self.reset();
        outcome.map(|_| ())
    }

    /// Context for a new cursor, starting the transaction first when one is due.
    ///
    /// # Errors
    /// Propagates a failure to begin.
    pub(crate) async fn cursor_context(
        &mut self,
        transport: &Arc<dyn Transport>,
        in_flight: &InFlightSlot,
    ) -> Result<RequestContext, AdapterError> {
        if !self.is_autocommit() && self.state == TransactionState::NoTransaction {
            self.begin(transport, in_flight).await?;
        }
        Ok(self.context.clone())
    }

    /// Follow transaction changes a user statement made (`START TRANSACTION`, `COMMIT`, ...).
    pub(crate) fn observe(&mut self, cursor: &Cursor) {
        if let Some(id) = cursor.started_transaction_id() {
            self.context = RequestContext::in_transaction(id);
            self.state = TransactionState::TransactionOpen;
        } else if cursor.cleared_transaction() {
            debug!("Transaction cleared by statement");
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.context = RequestContext::default();
        self.state = TransactionState::NoTransaction;
    }
}
