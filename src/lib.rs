//! Statement execution core for running SQL scripts against a Presto coordinator.
//!
//! A [`ConnectionManager`] opens a [`Connection`], splits a script into statements, substitutes
//! escaped literals for `?` placeholders, runs each statement through a [`Cursor`] and reports
//! an [`AdapterResponse`]. Failures surface as one [`AdapterError`] taxonomy.

use types::ParamConverter;
use types::RowValues;

pub mod classify;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod manager;
pub mod params;
pub mod prelude;
pub mod response;
pub mod results;
pub mod sql;
pub mod transaction;
pub mod transport;
pub mod types;

pub use config::Credentials;
pub use connection::Connection;
pub use cursor::{CancelHandle, Cursor};
pub use error::{AdapterError, ErrorKind};
pub use manager::{ConnectionManager, RunOptions};
pub use response::AdapterResponse;

/// Convert a parameter slice with any [`ParamConverter`], e.g. [`params::LiteralParams`].
///
/// # Errors
/// Whatever the converter rejects.
pub fn convert_sql_params<'a, T: ParamConverter<'a>>(
    params: &'a [RowValues],
) -> Result<T::Converted, AdapterError> {
    T::convert_sql_params(params)
}
