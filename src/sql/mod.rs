//! Lexical handling of SQL text: splitting scripts into statements and substituting escaped
//! literals for positional placeholders.
//!
//! Both walk the text with the same small state machine, so delimiters, comment markers and
//! `?` characters inside quoted literals or identifiers are left alone.

mod bind;
mod scanner;
mod split;

pub use bind::{PLACEHOLDER, bind_literals, count_placeholders};
pub use split::{DEFAULT_DELIMITER, Statement, split, split_script};
