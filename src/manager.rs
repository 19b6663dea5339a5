//! Entry point used by the orchestrator: open, run a script, report, close.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::AdapterError;
use crate::params::LiteralParams;
use crate::response::AdapterResponse;
use crate::sql::{DEFAULT_DELIMITER, bind_literals, split_script};
use crate::transport::Connector;
use crate::types::RowValues;

/// SQL longer than this is cut in debug logs when [`RunOptions::abridge_sql_log`] is set.
pub const ABRIDGED_SQL_LEN: usize = 512;

/// Per-call knobs for [`ConnectionManager::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Statement delimiter; empty means `;`.
    pub delimiter: String,
    /// Name reported by the empty-script error; defaults to the connection's name.
    pub unit_name: Option<String>,
    pub abridge_sql_log: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            unit_name: None,
            abridge_sql_log: false,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn with_unit_name(mut self, unit_name: impl Into<String>) -> Self {
        self.unit_name = Some(unit_name.into());
        self
    }

    #[must_use]
    pub fn abridged(mut self) -> Self {
        self.abridge_sql_log = true;
        self
    }
}

/// Opens connections through a [`Connector`] and runs scripts on them.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
}

#[cfg(feature = "http")]
impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(Arc::new(crate::transport::http::HttpConnector))
    }
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Open `conn` unless it already is.
    ///
    /// # Errors
    /// `Configuration` for invalid credentials (checked before any network attempt), or the
    /// connector's failure.
    pub fn open<'c>(&self, conn: &'c mut Connection) -> Result<&'c mut Connection, AdapterError> {
        conn.open_with(self.connector.as_ref())
    }

    /// # Errors
    /// A failure reported by the transport while closing.
    pub async fn close(&self, conn: &mut Connection) -> Result<(), AdapterError> {
        conn.close().await
    }

    /// Run every non-empty statement of `script` in order and return the cursor of the last one.
    ///
    /// Every statement is bound against the whole of `bindings`, so each one must have exactly
    /// as many `?` placeholders as there are values. All statements are checked before anything
    /// is sent.
    ///
    /// # Errors
    /// `EmptyScript` when nothing is executable, parameter errors before any round-trip, and
    /// the classified failure of the first statement that fails. Later statements are not run.
    pub async fn run<'c>(
        &self,
        conn: &'c mut Connection,
        script: &str,
        auto_begin: bool,
        bindings: Option<&[RowValues]>,
        options: &RunOptions,
    ) -> Result<&'c mut Cursor, AdapterError> {
        let unit = options
            .unit_name
            .clone()
            .unwrap_or_else(|| conn.name().to_string());
        let statements: Vec<_> = split_script(script, &options.delimiter, &unit)?
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        let literals = match bindings {
            Some(values) => Some(LiteralParams::convert(values)?),
            None => None,
        };
        let sqls = statements
            .iter()
            .map(|statement| match &literals {
                Some(literals) => bind_literals(statement.sql(), literals.as_slice()),
                None => Ok(statement.sql().to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.open(conn)?;
        if auto_begin {
            conn.begin().await?;
        }

        for sql in &sqls {
            debug!("Using presto connection \"{}\"", conn.name());
            debug!("On {}: {}", conn.name(), abridge(sql, options.abridge_sql_log));
            let started = Instant::now();

            let response = conn.cursor().await?.execute(sql, None).await?;
            conn.observe_current_cursor();
            debug!(
                "SQL status: {} in {:.2} seconds",
                response,
                started.elapsed().as_secs_f64()
            );
        }

        conn.current_cursor_mut()
            .ok_or_else(|| AdapterError::runtime("No statement was executed"))
    }

    /// Alias of [`Self::run`].
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn add_query<'c>(
        &self,
        conn: &'c mut Connection,
        script: &str,
        auto_begin: bool,
        bindings: Option<&[RowValues]>,
        options: &RunOptions,
    ) -> Result<&'c mut Cursor, AdapterError> {
        self.run(conn, script, auto_begin, bindings, options).await
    }

    #[must_use]
    pub fn get_response(cursor: &Cursor) -> AdapterResponse {
        AdapterResponse::from_cursor(cursor)
    }

    /// Cancel whatever runs on `conn`; a no-op when nothing does or the connection is closed.
    ///
    /// # Errors
    /// The classified failure of the cancel request.
    pub async fn cancel(&self, conn: &Connection) -> Result<(), AdapterError> {
        match conn.cancel_handle() {
            Some(handle) => {
                debug!("Cancelling query on connection '{}'", conn.name());
                handle.cancel().await
            }
            None => Ok(()),
        }
    }

    /// # Errors
    /// See [`Connection::begin`].
    pub async fn begin(&self, conn: &mut Connection) -> Result<(), AdapterError> {
        conn.begin().await
    }

    /// # Errors
    /// See [`Connection::commit`].
    pub async fn commit(&self, conn: &mut Connection) -> Result<(), AdapterError> {
        conn.commit().await
    }

    /// # Errors
    /// See [`Connection::rollback`].
    pub async fn rollback(&self, conn: &mut Connection) -> Result<(), AdapterError> {
        conn.rollback().await
    }

    /// Hook for callers that emit explicit `BEGIN`s; transactions are driven by the isolation
    /// level instead, so nothing is sent.
    pub fn add_begin_query(&self) {}

    /// Counterpart of [`Self::add_begin_query`]; nothing is sent.
    pub fn add_commit_query(&self) {}
}

fn abridge(sql: &str, enabled: bool) -> &str {
    if !enabled || sql.len() <= ABRIDGED_SQL_LEN {
        return sql;
    }
    let mut end = ABRIDGED_SQL_LEN;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
