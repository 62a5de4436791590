//! Structural cyclomatic complexity.
//!
//! Complexity is calculated as:
//! - Start at 1
//! - Add 1 for each: if, elif, for, while, match, except
//! - Add N-1 for a boolean combination of N operands
//!
//! Python is counted over the syntax tree. Scanned languages count keyword
//! and operator tokens in the comment- and literal-blanked code view.

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use regex::Regex;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::extract::ParsedFile;
use crate::model::SourceLocation;

const BRANCH_QUERY: &str = r#"
(if_statement) @branch
(elif_clause) @branch
(for_statement) @branch
(while_statement) @branch
(match_statement) @branch
(boolean_operator) @branch
(except_clause) @branch
"#;

/// Compiled on first use.
static COMPILED_BRANCH_QUERY: OnceCell<Query> = OnceCell::new();

lazy_static! {
    static ref BRANCH_TOKEN: Regex =
        Regex::new(r"\b(?:if|while|for|foreach|case|catch)\b|&&|\|\|").unwrap();
}

/// Complexity of one Python `function_definition`, nested definitions included.
pub fn python_complexity(parsed: &ParsedFile, function: Node) -> anyhow::Result<u32> {
    let query = COMPILED_BRANCH_QUERY.get_or_try_init(|| {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        Query::new(&language, BRANCH_QUERY)
    })?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, function, parsed.source.as_bytes());

    let mut complexity = 1;
    while let Some(m) = matches.next() {
        complexity += m.captures.len() as u32;
    }
    Ok(complexity)
}

/// Complexity of the lines a scanned function covers.
pub fn scanned_complexity(code: &[String], location: &SourceLocation) -> u32 {
    let start = location.start_line.saturating_sub(1);
    let end = location.end_line.min(code.len());
    let branches: usize = code
        .get(start..end)
        .unwrap_or(&[])
        .iter()
        .map(|line| BRANCH_TOKEN.find_iter(line).count())
        .sum();
    1 + branches as u32
}
