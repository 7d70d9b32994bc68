//! CSV parsing and order-preserving duplicate row removal.
//!
//! # Overview
//!
//! Decoded text is parsed into [`Row`]s with RFC 4180 quoting. A row's
//! identity is the full ordered tuple of its parsed field values, so two rows
//! that differ only in how a field was quoted are duplicates, while rows that
//! differ in any single field value (including whitespace or case) are not.
//!
//! The first occurrence of each row is kept and output order mirrors input
//! order restricted to the kept rows. A blank line is a row with no fields.
//!
//! # Example
//!
//! ```
//! use sjis_dedupe::dedupe::{dedupe_rows, parse_rows};
//!
//! let rows = parse_rows("a,b\n\"a\",b\nc,d\n").unwrap();
//! let (kept, stats) = dedupe_rows(rows);
//!
//! assert_eq!(kept.len(), 2);
//! assert_eq!(stats.duplicates_removed, 1);
//! assert_eq!(kept[1].fields(), ["c", "d"]);
//! ```

use std::collections::HashSet;

use serde::Serialize;

use crate::error::DedupeError;

/// One parsed CSV record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row(Vec<String>);

impl Row {
    /// Create a row from its field values.
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    /// The field values in order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the row, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&csv::StringRecord> for Row {
    fn from(record: &csv::StringRecord) -> Self {
        record.iter().collect()
    }
}

/// Counters describing one dedup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeStats {
    /// Rows seen in the input.
    pub rows_read: usize,
    /// Rows kept for output.
    pub rows_retained: usize,
    /// Rows dropped as repeats of an earlier row.
    pub duplicates_removed: usize,
}

/// Order-preserving exact-duplicate filter.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<Row>,
    retained: Vec<Row>,
    stats: DedupeStats,
}

impl Deduplicator {
    /// Create an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the next row in input order.
    ///
    /// Returns `true` if this is the row's first occurrence and it was kept.
    pub fn push(&mut self, row: Row) -> bool {
        self.stats.rows_read += 1;
        if self.seen.contains(&row) {
            self.stats.duplicates_removed += 1;
            log::trace!("Dropping duplicate row {}", self.stats.rows_read);
            return false;
        }
        self.seen.insert(row.clone());
        self.retained.push(row);
        self.stats.rows_retained += 1;
        true
    }

    /// Statistics for the rows offered so far.
    #[must_use]
    pub fn stats(&self) -> DedupeStats {
        self.stats
    }

    /// Finish the pass, returning the kept rows in first-occurrence order.
    #[must_use]
    pub fn finish(self) -> (Vec<Row>, DedupeStats) {
        (self.retained, self.stats)
    }
}

/// Remove repeated rows, keeping first occurrences in order.
#[must_use]
pub fn dedupe_rows<I>(rows: I) -> (Vec<Row>, DedupeStats)
where
    I: IntoIterator<Item = Row>,
{
    let mut dedup = Deduplicator::new();
    for row in rows {
        dedup.push(row);
    }
    dedup.finish()
}

/// Parse comma-separated text into rows.
///
/// Rows may have different field counts. A blank line is a row without
/// fields, so it takes part in deduplication like any other row.
///
/// # Errors
///
/// Returns [`DedupeError::Parse`] if a quoted field is never closed, naming
/// the line on which that field starts.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, DedupeError> {
    let layout = scan_records(text)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    // The csv reader skips blank lines; put them back where the scan saw them.
    let mut rows = Vec::with_capacity(layout.len());
    for kind in layout {
        match kind {
            RecordKind::Blank => rows.push(Row::new(Vec::new())),
            RecordKind::Fields => match records.next() {
                Some(result) => rows.push(Row::from(&result.map_err(parse_error)?)),
                None => break,
            },
        }
    }
    for result in records {
        rows.push(Row::from(&result.map_err(parse_error)?));
    }

    log::debug!("Parsed {} rows", rows.len());
    Ok(rows)
}

fn parse_error(e: csv::Error) -> DedupeError {
    DedupeError::Parse {
        line: e.position().map_or(0, csv::Position::line),
        message: e.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Blank,
    Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Classify each record of `text` as blank or holding fields, verifying
/// every quoted field is closed before end of input.
///
/// The `csv` reader silently accepts an unterminated quoted field at the end
/// of its input, so the check is done up front with the same field rules:
/// a quote only opens a field at field start, `""` inside a quoted field is
/// an escaped quote, and text after a closing quote is kept literally.
/// `\r\n`, `\r` and `\n` each end a record outside quotes.
fn scan_records(text: &str) -> Result<Vec<RecordKind>, DedupeError> {
    let mut layout = Vec::new();
    let mut state = QuoteState::FieldStart;
    let mut at_record_start = true;
    let mut line: u64 = 1;
    let mut opened_at: u64 = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }

        if state != QuoteState::Quoted && matches!(c, '\r' | '\n') {
            if c == '\r' && chars.next_if_eq(&'\n').is_some() {
                line += 1;
            }
            if at_record_start {
                layout.push(RecordKind::Blank);
            }
            at_record_start = true;
            state = QuoteState::FieldStart;
            continue;
        }

        if at_record_start {
            layout.push(RecordKind::Fields);
            at_record_start = false;
        }
        state = match (state, c) {
            (QuoteState::FieldStart, '"') => {
                opened_at = line;
                QuoteState::Quoted
            }
            (QuoteState::Quoted, '"') => QuoteState::QuoteInQuoted,
            (QuoteState::QuoteInQuoted, '"') => QuoteState::Quoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (_, ',') => QuoteState::FieldStart,
            _ => QuoteState::Unquoted,
        };
    }

    if state == QuoteState::Quoted {
        return Err(DedupeError::Parse {
            line: opened_at,
            message: "unterminated quoted field".to_string(),
        });
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_scenario_duplicate_removed_order_kept() {
        let rows = vec![row(&["a", "b"]), row(&["a", "b"]), row(&["c", "d"])];
        let (kept, stats) = dedupe_rows(rows);
        assert_eq!(kept, vec![row(&["a", "b"]), row(&["c", "d"])]);
        assert_eq!(
            stats,
            DedupeStats {
                rows_read: 3,
                rows_retained: 2,
                duplicates_removed: 1,
            }
        );
    }

    #[test]
    fn test_first_occurrence_order() {
        let rows = vec![
            row(&["x"]),
            row(&["y"]),
            row(&["x"]),
            row(&["z"]),
            row(&["y"]),
        ];
        let (kept, _) = dedupe_rows(rows);
        assert_eq!(kept, vec![row(&["x"]), row(&["y"]), row(&["z"])]);
    }

    #[test]
    fn test_no_normalization() {
        let rows = vec![
            row(&["a", "b"]),
            row(&["a ", "b"]),
            row(&["A", "b"]),
            row(&["a", "b", ""]),
        ];
        let (kept, stats) = dedupe_rows(rows);
        assert_eq!(kept.len(), 4);
        assert_eq!(stats.duplicates_removed, 0);
    }

    #[test]
    fn test_header_is_ordinary_row() {
        let rows = parse_rows("id,name\n1,a\nid,name\n2,b\n").unwrap();
        let (kept, _) = dedupe_rows(rows);
        assert_eq!(
            kept,
            vec![row(&["id", "name"]), row(&["1", "a"]), row(&["2", "b"])]
        );
    }

    #[test]
    fn test_deduplicator_push_reports_retention() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.push(row(&["a"])));
        assert!(!dedup.push(row(&["a"])));
        assert!(dedup.push(row(&["b"])));
        assert_eq!(dedup.stats().rows_read, 3);
        assert_eq!(dedup.stats().duplicates_removed, 1);
    }

    #[test]
    fn test_parse_quoted_delimiter() {
        let rows = parse_rows("\"Tokyo, Japan\",1\n").unwrap();
        assert_eq!(rows, vec![row(&["Tokyo, Japan", "1"])]);
    }

    #[test]
    fn test_parse_embedded_newline_and_quote() {
        let rows = parse_rows("\"line1\nline2\",\"say \"\"hi\"\"\"\r\nnext,row\r\n").unwrap();
        assert_eq!(
            rows,
            vec![row(&["line1\nline2", "say \"hi\""]), row(&["next", "row"])]
        );
    }

    #[test]
    fn test_parse_quoting_equivalence() {
        let rows = parse_rows("a,b\n\"a\",\"b\"\n").unwrap();
        let (kept, stats) = dedupe_rows(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn test_parse_ragged_rows() {
        let rows = parse_rows("a\nb,c,d\n").unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_parse_no_trailing_newline() {
        let rows = parse_rows("a,b\nc,d").unwrap();
        assert_eq!(rows, vec![row(&["a", "b"]), row(&["c", "d"])]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_rows("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_japanese_fields() {
        let rows = parse_rows("名前,住所\n山田,\"東京都, 千代田区\"\n").unwrap();
        assert_eq!(rows[1], row(&["山田", "東京都, 千代田区"]));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let result = parse_rows("a,b\nc,\"unclosed\nmore text\n");
        match result {
            Err(DedupeError::Parse { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("unterminated"));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let rows = parse_rows("5\" disk,a\n").unwrap();
        assert_eq!(rows, vec![row(&["5\" disk", "a"])]);
    }

    #[test]
    fn test_scan_escaped_quote_at_end() {
        assert!(scan_records("\"a\"\"\"").is_ok());
        assert!(scan_records("\"a\"\"").is_err());
    }

    #[test]
    fn test_blank_lines_are_empty_rows() {
        let rows = parse_rows("a\n\nb\n\n").unwrap();
        assert_eq!(
            rows,
            vec![row(&["a"]), Row::new(Vec::new()), row(&["b"]), Row::new(Vec::new())]
        );

        let (kept, stats) = dedupe_rows(rows);
        assert_eq!(kept, vec![row(&["a"]), Row::new(Vec::new()), row(&["b"])]);
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn test_blank_line_differs_from_empty_field() {
        let rows = parse_rows("\"\"\r\n\r\n").unwrap();
        assert_eq!(rows, vec![row(&[""]), Row::new(Vec::new())]);
    }

    #[test]
    fn test_scan_terminators() {
        use RecordKind::{Blank, Fields};
        assert_eq!(scan_records("a\r\nb").unwrap(), vec![Fields, Fields]);
        assert_eq!(scan_records("\r\n\ra\n").unwrap(), vec![Blank, Blank, Fields]);
        assert_eq!(scan_records("\"x\n\ny\"\n\n").unwrap(), vec![Fields, Blank]);
        assert!(scan_records("").unwrap().is_empty());
    }
}
