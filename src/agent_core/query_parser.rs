//! Combined-input parsing.
//!
//! Grammar: segments separated by `|`, each optionally introduced by a
//! `file:` or `query:` tag, in any order. Parsing never fails; input that
//! does not fit the grammar is taken verbatim as the query.

use super::types::ParsedInput;

const DELIMITER: char = '|';
const FILE_TAG: &str = "file:";
const QUERY_TAG: &str = "query:";

/// Split `raw` into query text and an optional file marker.
///
/// - No delimiter: `(raw, None)`.
/// - Delimiter with tags: the tagged values, last tag of each kind wins.
///   A missing `query:` tag leaves the query as the full input.
/// - Delimiter without any recognizable tag: `(raw, None)`.
pub fn parse(raw: &str) -> ParsedInput {
    if !raw.contains(DELIMITER) {
        return ParsedInput {
            query: raw.to_string(),
            file_reference: None,
        };
    }

    let mut file: Option<String> = None;
    let mut query: Option<String> = None;

    for segment in raw.split(DELIMITER) {
        let segment = segment.trim();
        if let Some(value) = strip_tag(segment, FILE_TAG) {
            file = Some(value.to_string());
        } else if let Some(value) = strip_tag(segment, QUERY_TAG) {
            query = Some(value.to_string());
        }
    }

    ParsedInput {
        query: query.unwrap_or_else(|| raw.to_string()),
        file_reference: file.filter(|f| !f.is_empty()),
    }
}

/// Case-insensitive tag match; returns the trimmed value after the tag.
fn strip_tag<'a>(segment: &'a str, tag: &str) -> Option<&'a str> {
    let head = segment.get(..tag.len())?;
    if head.eq_ignore_ascii_case(tag) {
        Some(segment[tag.len()..].trim())
    } else {
        None
    }
}
