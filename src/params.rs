//! Literal escaping for statement parameters.
//!
//! Presto never receives bind parameters on the wire, so every value is rendered into SQL text
//! here. Numbers pass through unquoted; callers must not feed attacker-controlled strings in
//! as numbers.

use crate::error::AdapterError;
use crate::types::{ParamConverter, RowValues};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render a single value as an inline SQL literal.
///
/// # Errors
/// Returns `AdapterError::UnsupportedParameterType` for `Bool`, `JSON` and `Blob` values.
pub fn escape(value: &RowValues) -> Result<String, AdapterError> {
    match value {
        RowValues::Null => Ok("NULL".to_string()),
        RowValues::Text(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        RowValues::Int(i) => Ok(i.to_string()),
        RowValues::Float(f) if f.is_nan() => Ok("nan()".to_string()),
        RowValues::Float(f) if f.is_infinite() => Ok(if *f > 0.0 {
            "infinity()".to_string()
        } else {
            "-infinity()".to_string()
        }),
        RowValues::Float(f) => Ok(f.to_string()),
        // %.3f truncates sub-millisecond digits rather than rounding
        RowValues::Timestamp(ts) => Ok(format!("TIMESTAMP '{}'", ts.format(TIMESTAMP_FORMAT))),
        RowValues::Date(d) => Ok(format!("DATE '{}'", d.format(DATE_FORMAT))),
        RowValues::Bool(_) | RowValues::JSON(_) | RowValues::Blob(_) => Err(
            AdapterError::UnsupportedParameterType(value.type_name().to_string()),
        ),
    }
}

/// Parameters rendered as SQL literals, in positional order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteralParams {
    literals: Vec<String>,
}

impl LiteralParams {
    /// Escape every value, failing on the first unsupported one.
    ///
    /// # Errors
    /// Returns `AdapterError::UnsupportedParameterType` if any value cannot be escaped.
    pub fn convert(params: &[RowValues]) -> Result<Self, AdapterError> {
        let literals = params.iter().map(escape).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { literals })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.literals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

impl<'a> ParamConverter<'a> for LiteralParams {
    type Converted = LiteralParams;

    fn convert_sql_params(params: &'a [RowValues]) -> Result<Self::Converted, AdapterError> {
        Self::convert(params)
    }
}
