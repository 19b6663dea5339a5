const LINE_COMMENT: [u8; 2] = *b"--";
const BLOCK_OPEN: [u8; 2] = *b"/*";
const BLOCK_CLOSE: [u8; 2] = *b"*/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

/// What a run of SQL text is, lexically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Plain SQL; the only place delimiters and placeholders are recognised.
    Code,
    /// A quoted string literal or quoted identifier, quotes included.
    Quoted,
    /// A `--` comment (without its newline) or a `/* */` comment.
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment<'a> {
    pub(crate) kind: SegmentKind,
    pub(crate) text: &'a str,
}

/// Cut `sql` into code, quoted and comment runs.
///
/// Concatenating the segment texts reproduces `sql` exactly. An unterminated quote or block
/// comment runs to the end of the input.
pub(crate) fn segments(sql: &str) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut state = State::Normal;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let next = match b {
                    b'\'' => Some(State::SingleQuoted),
                    b'"' => Some(State::DoubleQuoted),
                    _ if pair_at(bytes, idx, LINE_COMMENT) => Some(State::LineComment),
                    _ if pair_at(bytes, idx, BLOCK_OPEN) => Some(State::BlockComment(1)),
                    _ => None,
                };
                if let Some(next) = next {
                    push(&mut out, SegmentKind::Code, sql, start, idx);
                    start = idx;
                    state = next;
                    if matches!(next, State::LineComment | State::BlockComment(_)) {
                        idx += 1; // second marker byte
                    }
                }
            }
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if state == State::SingleQuoted { b'\'' } else { b'"' };
                if pair_at(bytes, idx, [quote, quote]) {
                    // doubled quote is an escaped quote
                    idx += 1;
                } else if b == quote {
                    push(&mut out, SegmentKind::Quoted, sql, start, idx + 1);
                    start = idx + 1;
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    push(&mut out, SegmentKind::Comment, sql, start, idx);
                    start = idx;
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if pair_at(bytes, idx, BLOCK_OPEN) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if pair_at(bytes, idx, BLOCK_CLOSE) {
                    idx += 1;
                    if depth == 1 {
                        push(&mut out, SegmentKind::Comment, sql, start, idx + 1);
                        start = idx + 1;
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
        }
        idx += 1;
    }

    let tail = match state {
        State::Normal => SegmentKind::Code,
        State::SingleQuoted | State::DoubleQuoted => SegmentKind::Quoted,
        State::LineComment | State::BlockComment(_) => SegmentKind::Comment,
    };
    push(&mut out, tail, sql, start, bytes.len());
    out
}

fn pair_at(bytes: &[u8], idx: usize, pair: [u8; 2]) -> bool {
    bytes.get(idx..idx + 2) == Some(&pair[..])
}

fn push<'a>(out: &mut Vec<Segment<'a>>, kind: SegmentKind, sql: &'a str, start: usize, end: usize) {
    if end > start {
        out.push(Segment {
            kind,
            text: &sql[start..end],
        });
    }
}
