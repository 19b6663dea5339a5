//! A named connection: credentials, the transport once opened, its transaction state and the
//! cursor of the last statement.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::Credentials;
use crate::cursor::{CancelHandle, Cursor, InFlightSlot};
use crate::error::AdapterError;
use crate::transaction::{TransactionController, TransactionState};
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

struct ConnectionHandle {
    transport: Arc<dyn Transport>,
    transaction: TransactionController,
    in_flight: InFlightSlot,
    cursor: Option<Cursor>,
}

/// One engine session, owned by whoever runs statements on it.
///
/// The connection starts closed; nothing touches the network until it is opened.
pub struct Connection {
    name: String,
    credentials: Credentials,
    handle: Option<ConnectionHandle>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Create a closed connection.
    ///
    /// # Arguments
    ///
    /// * `name` - Identifier of the unit of work this connection serves; shows up in errors
    /// * `credentials` - Profile values used when the connection is opened
    pub fn new(name: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            name: name.into(),
            credentials,
            handle: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Open through `connector` unless already open.
    ///
    /// Credentials are validated first, so a bad auth/scheme combination never reaches the
    /// connector.
    ///
    /// # Errors
    /// `AdapterError::Configuration` for invalid credentials, or whatever the connector reports.
    pub fn open_with(&mut self, connector: &dyn Connector) -> Result<&mut Self, AdapterError> {
        if self.is_open() {
            debug!("Connection is already open, skipping open.");
            return Ok(self);
        }

        let settings = self.credentials.settings()?;
        debug!(
            "Opening connection '{}' to {}",
            self.name,
            settings.base_url()
        );
        let transport = connector.connect(&settings)?;
        self.handle = Some(ConnectionHandle {
            transport,
            transaction: TransactionController::new(self.credentials.isolation_level),
            in_flight: InFlightSlot::default(),
            cursor: None,
        });
        Ok(self)
    }

    /// Open over HTTP unless already open.
    ///
    /// # Errors
    /// See [`Self::open_with`].
    #[cfg(feature = "http")]
    pub fn open(&mut self) -> Result<&mut Self, AdapterError> {
        self.open_with(&crate::transport::http::HttpConnector)
    }

    /// Release the transport. Closing a closed connection does nothing.
    ///
    /// # Errors
    /// A failure reported by the transport while closing; the connection is closed regardless.
    pub async fn close(&mut self) -> Result<(), AdapterError> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        if let Some(cursor) = handle.cursor.as_mut() {
            cursor.close();
        }
        debug!("Closing connection '{}'", self.name);
        handle
            .transport
            .close()
            .await
            .map_err(|e| crate::classify::classify(e, None))
    }

    /// A fresh cursor, replacing the previous one.
    ///
    /// Starts the transaction first when the isolation level asks for one.
    ///
    /// # Errors
    /// `UnknownRuntime` when the connection is closed, or a failure to begin the transaction.
    pub async fn cursor(&mut self) -> Result<&mut Cursor, AdapterError> {
        let handle = self.handle_mut()?;
        let context = handle
            .transaction
            .cursor_context(&handle.transport, &handle.in_flight)
            .await?;
        if let Some(mut previous) = handle.cursor.take() {
            previous.close();
        }
        let cursor = Cursor::new(
            Arc::clone(&handle.transport),
            context,
            handle.in_flight.clone(),
        );
        Ok(handle.cursor.insert(cursor))
    }

    /// Cursor of the last statement, if one was created since opening.
    #[must_use]
    pub fn current_cursor(&self) -> Option<&Cursor> {
        self.handle.as_ref().and_then(|h| h.cursor.as_ref())
    }

    pub fn current_cursor_mut(&mut self) -> Option<&mut Cursor> {
        self.handle.as_mut().and_then(|h| h.cursor.as_mut())
    }

    /// Handle that cancels whatever runs on this connection, usable from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.handle
            .as_ref()
            .map(|h| CancelHandle::new(Arc::clone(&h.transport), h.in_flight.clone()))
    }

    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.handle
            .as_ref()
            .map_or(TransactionState::NoTransaction, |h| h.transaction.state())
    }

    /// Start a transaction now instead of on the next cursor. No-op under autocommit.
    ///
    /// # Errors
    /// `UnknownRuntime` when closed, or the classified failure of `START TRANSACTION`.
    pub async fn begin(&mut self) -> Result<(), AdapterError> {
        let handle = self.handle_mut()?;
        handle
            .transaction
            .begin(&handle.transport, &handle.in_flight)
            .await
    }

    /// # Errors
    /// `UnknownRuntime` when closed, or the classified failure of `COMMIT`.
    pub async fn commit(&mut self) -> Result<(), AdapterError> {
        let handle = self.handle_mut()?;
        handle
            .transaction
            .commit(&handle.transport, &handle.in_flight)
            .await
    }

    /// # Errors
    /// `UnknownRuntime` when closed, or the classified failure of `ROLLBACK`.
    pub async fn rollback(&mut self) -> Result<(), AdapterError> {
        let handle = self.handle_mut()?;
        handle
            .transaction
            .rollback(&handle.transport, &handle.in_flight)
            .await
    }

    /// Let the transaction state follow what the current cursor's statement did.
    pub(crate) fn observe_current_cursor(&mut self) {
        if let Some(handle) = self.handle.as_mut()
            && let Some(cursor) = handle.cursor.as_ref()
        {
            handle.transaction.observe(cursor);
        }
    }

    fn handle_mut(&mut self) -> Result<&mut ConnectionHandle, AdapterError> {
        let name = &self.name;
        self.handle
            .as_mut()
            .ok_or_else(|| AdapterError::runtime(format!("Connection '{name}' is not open")))
    }
}
