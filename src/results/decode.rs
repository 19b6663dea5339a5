use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use super::result_set::ResultSet;
use crate::error::AdapterError;
use crate::transport::Column;
use crate::types::RowValues;

/// Build a result set from the column metadata and raw JSON rows of a finished query.
///
/// # Errors
/// Returns `AdapterError::UnknownRuntime` if a row has more values than there are columns.
pub fn build_result_set(
    columns: &[Column],
    data: Vec<Vec<JsonValue>>,
) -> Result<ResultSet, AdapterError> {
    let mut result_set = ResultSet::with_capacity(data.len());
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    result_set.set_column_names(Arc::new(column_names));

    for (row_idx, row) in data.into_iter().enumerate() {
        if row.len() > columns.len() {
            return Err(AdapterError::runtime(format!(
                "row {row_idx} has {} values but the query reported {} columns",
                row.len(),
                columns.len()
            )));
        }
        let mut row_values = Vec::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(row) {
            row_values.push(presto_extract_value(&column.type_name, value));
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Convert one JSON cell into a `RowValues` using the engine's type name.
///
/// Values that do not match their declared type are kept rather than rejected: strings as
/// `Text`, anything else as `JSON`.
#[must_use]
pub fn presto_extract_value(type_name: &str, value: JsonValue) -> RowValues {
    if value.is_null() {
        return RowValues::Null;
    }

    let lowered = type_name.to_ascii_lowercase();
    let base = lowered.split('(').next().unwrap_or_default().trim();

    match base {
        "tinyint" | "smallint" | "integer" | "bigint" => match value.as_i64() {
            Some(i) => RowValues::Int(i),
            None => fallback(value),
        },
        "real" | "double" => {
            let parsed = match &value {
                JsonValue::Number(n) => n.as_f64(),
                // NaN and infinities arrive as strings
                JsonValue::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            parsed.map_or_else(|| fallback(value), RowValues::Float)
        }
        "boolean" => match value.as_bool() {
            Some(b) => RowValues::Bool(b),
            None => fallback(value),
        },
        "date" => match value.as_str().and_then(parse_date) {
            Some(d) => RowValues::Date(d),
            None => fallback(value),
        },
        "timestamp" if !lowered.contains("with time zone") => {
            match value.as_str().and_then(parse_timestamp) {
                Some(ts) => RowValues::Timestamp(ts),
                None => fallback(value),
            }
        }
        "json" | "array" | "map" | "row" => RowValues::JSON(value),
        _ => fallback(value),
    }
}

fn fallback(value: JsonValue) -> RowValues {
    match value {
        JsonValue::String(s) => RowValues::Text(s),
        other => RowValues::JSON(other),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}
