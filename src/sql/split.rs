use crate::error::AdapterError;

use super::scanner::{SegmentKind, segments};

/// Statement delimiter used when the caller does not pick one.
pub const DEFAULT_DELIMITER: &str = ";";

/// One delimiter-separated piece of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    index: usize,
    raw: String,
    stripped: String,
}

impl Statement {
    /// Position of the piece in the original script, counting empty pieces.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The piece as written, delimiter removed, comments kept.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text sent to the engine: the raw piece trimmed, comments included so query annotations
    /// reach the coordinator.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.raw.trim()
    }

    /// The piece with each comment replaced by one space, trimmed. Only used to decide
    /// whether the piece holds any SQL.
    #[must_use]
    pub fn stripped(&self) -> &str {
        &self.stripped
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stripped.is_empty()
    }
}

/// Split `script` on `delimiter` into ordered statements.
///
/// Delimiters and comment markers inside quoted literals or identifiers are ordinary text.
/// The piece after the final delimiter is kept (usually empty). An empty `delimiter` falls
/// back to [`DEFAULT_DELIMITER`].
#[must_use]
pub fn split(script: &str, delimiter: &str) -> Vec<Statement> {
    let delimiter = if delimiter.is_empty() {
        DEFAULT_DELIMITER
    } else {
        delimiter
    };

    let mut statements = Vec::new();
    let mut raw = String::new();
    let mut stripped = String::new();

    for segment in segments(script) {
        match segment.kind {
            SegmentKind::Code => {
                let mut pieces = segment.text.split(delimiter).peekable();
                while let Some(piece) = pieces.next() {
                    raw.push_str(piece);
                    stripped.push_str(piece);
                    if pieces.peek().is_some() {
                        finish(&mut statements, &mut raw, &mut stripped);
                    }
                }
            }
            SegmentKind::Quoted => {
                raw.push_str(segment.text);
                stripped.push_str(segment.text);
            }
            SegmentKind::Comment => {
                raw.push_str(segment.text);
                stripped.push(' ');
            }
        }
    }
    finish(&mut statements, &mut raw, &mut stripped);

    statements
}

/// Split `script` and require at least one executable statement.
///
/// # Errors
/// Returns `AdapterError::EmptyScript` naming `unit` when every statement is empty after
/// comment stripping.
pub fn split_script(
    script: &str,
    delimiter: &str,
    unit: &str,
) -> Result<Vec<Statement>, AdapterError> {
    let statements = split(script, delimiter);
    if statements.iter().all(Statement::is_empty) {
        return Err(AdapterError::EmptyScript {
            unit: unit.to_string(),
            sql: script.to_string(),
        });
    }
    Ok(statements)
}

fn finish(statements: &mut Vec<Statement>, raw: &mut String, stripped: &mut String) {
    statements.push(Statement {
        index: statements.len(),
        raw: std::mem::take(raw),
        stripped: std::mem::take(stripped).trim().to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executable(script: &str) -> Vec<String> {
        split(script, DEFAULT_DELIMITER)
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.stripped().to_string())
            .collect()
    }

    #[test]
    fn comment_only_pieces_are_empty() {
        assert_eq!(
            executable("SELECT 1;  -- c\nSELECT 2;\n   ;\n"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn keeps_original_indexes() {
        let statements = split("select 1;;select 2", ";");
        assert_eq!(statements.len(), 3);
        assert!(statements[1].is_empty());
        assert_eq!(statements[2].index(), 2);
        assert_eq!(statements[2].sql(), "select 2");
    }

    #[test]
    fn quoted_delimiters_and_markers_are_text() {
        assert_eq!(
            executable("insert into t values ('a;b', '--not a comment'); select \"x;y\" from t"),
            vec![
                "insert into t values ('a;b', '--not a comment')",
                "select \"x;y\" from t"
            ]
        );
    }

    #[test]
    fn block_comments_are_stripped() {
        assert_eq!(
            executable("/* header; with delimiter */ select 1 /* trailing */"),
            vec!["select 1"]
        );
    }

    #[test]
    fn sent_text_keeps_comments() {
        let statements = split("-- lead\nselect 1 ;", ";");
        assert_eq!(statements[0].raw(), "-- lead\nselect 1 ");
        assert_eq!(statements[0].sql(), "-- lead\nselect 1");
        assert_eq!(statements[0].stripped(), "select 1");
    }

    #[test]
    fn block_comment_between_tokens_keeps_them_apart() {
        let statements = split("select a/* note */from t", ";");
        assert_eq!(statements[0].sql(), "select a/* note */from t");
        assert_eq!(statements[0].stripped(), "select a from t");
    }

    #[test]
    fn custom_delimiter() {
        assert_eq!(
            split("select 1 $$ select 2", "$$")
                .iter()
                .map(Statement::sql)
                .collect::<Vec<_>>(),
            vec!["select 1", "select 2"]
        );
    }

    #[test]
    fn empty_script_names_unit() {
        let err = split_script("-- only a comment\n;\n  ;", ";", "my_model").unwrap_err();
        match err {
            AdapterError::EmptyScript { unit, .. } => assert_eq!(unit, "my_model"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
