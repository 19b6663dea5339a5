//! Convenient imports for common functionality.

pub use crate::config::{AuthMethod, ConnectionSettings, Credentials, HttpScheme, SslVerify};
pub use crate::connection::{Connection, ConnectionState};
pub use crate::convert_sql_params;
pub use crate::cursor::{CancelHandle, Cursor};
pub use crate::error::{AdapterError, ErrorKind};
pub use crate::manager::{ConnectionManager, RunOptions};
pub use crate::params::{LiteralParams, escape};
pub use crate::response::AdapterResponse;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::sql::{Statement, split, split_script};
pub use crate::transaction::{IsolationLevel, TransactionState};
pub use crate::transport::{Connector, QueryPage, RequestContext, Transport, TransportError};
pub use crate::types::{ParamConverter, RowValues};

#[cfg(feature = "http")]
pub use crate::transport::http::{HttpConnector, HttpTransport};
