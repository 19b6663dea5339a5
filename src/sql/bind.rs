use crate::error::AdapterError;

use super::scanner::{SegmentKind, segments};

/// Positional placeholder recognised in statement text.
pub const PLACEHOLDER: char = '?';

/// Count `?` placeholders outside quoted text and comments.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    segments(sql)
        .iter()
        .filter(|s| s.kind == SegmentKind::Code)
        .map(|s| s.text.matches(PLACEHOLDER).count())
        .sum()
}

/// Substitute already-escaped literals for the placeholders of `sql`, left to right.
///
/// # Errors
/// Returns `AdapterError::ParameterCountMismatch` when the number of placeholders differs
/// from the number of literals.
pub fn bind_literals<S: AsRef<str>>(sql: &str, literals: &[S]) -> Result<String, AdapterError> {
    let placeholders = count_placeholders(sql);
    if placeholders != literals.len() {
        return Err(AdapterError::ParameterCountMismatch {
            placeholders,
            supplied: literals.len(),
        });
    }

    let mut out = String::with_capacity(sql.len());
    let mut next = literals.iter();
    for segment in segments(sql) {
        if segment.kind != SegmentKind::Code {
            out.push_str(segment.text);
            continue;
        }
        for ch in segment.text.chars() {
            if ch == PLACEHOLDER {
                // counted above, so the iterator cannot run dry
                if let Some(literal) = next.next() {
                    out.push_str(literal.as_ref());
                }
            } else {
                out.push(ch);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_in_order() {
        let sql = bind_literals("select * from t where a = ? and b = ?", &["1", "'x'"]).unwrap();
        assert_eq!(sql, "select * from t where a = 1 and b = 'x'");
    }

    #[test]
    fn ignores_placeholders_in_literals_and_comments() {
        let sql = "select '?' as q, ? -- why?\n/* ? */";
        assert_eq!(count_placeholders(sql), 1);
        assert_eq!(
            bind_literals(sql, &["NULL"]).unwrap(),
            "select '?' as q, NULL -- why?\n/* ? */"
        );
    }

    #[test]
    fn literal_containing_placeholder_is_not_rebound() {
        let sql = bind_literals("select ?, ?", &["'?'", "2"]).unwrap();
        assert_eq!(sql, "select '?', 2");
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = bind_literals("select ?", &["1", "2"]).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::ParameterCountMismatch {
                placeholders: 1,
                supplied: 2
            }
        ));
        assert!(bind_literals::<&str>("select ?", &[]).is_err());
    }
}
