// Parser driver: the explicit state machine that alternates matching
// escape-open, raw/escaped field bytes, field-delimiter, and
// record-delimiter, enforcing column-count policy and tracking byte-based
// line/column for diagnostics. Ported from libdsv's dsv_parser_low.cc state
// transitions over `parser` (parser.h). The raw/escaped inner-loop idiom
// (byte-at-a-time scan retrying delimiter tests at each position) is
// generalized from the teacher's `strategy/general.rs::parse_row_general`,
// which does the same thing for single-byte/single multi-byte separators.

use std::io::Read;

use tracing::{instrument, trace};

use crate::config::{ColumnPolicy, ParserConfig};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticLevel, DiagnosticSink, TracingSink};
use crate::error::ParseError;
use crate::matcher::read_bytes;
use crate::scanner::Scanner;
use crate::sequence::EquivalenceSet;

/// Outcome of a completed (non-error) parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    UserAborted,
}

/// The callback surface a caller implements to receive parsed rows and
/// diagnostics. `log` has a no-op default so callers who only care about
/// data don't have to wire one up.
pub trait ParserCallbacks {
    fn header(&mut self, fields: &[&[u8]]) -> bool;
    fn record(&mut self, fields: &[&[u8]]) -> bool;
    fn log(&mut self, _code: DiagnosticCode, _level: DiagnosticLevel, _params: &[String]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RowStart,
    FieldStart,
    InRawField,
    InEscapedField(usize),
    AfterField,
    Eof,
}

/// Attempt `set` at the scanner's current position. Returns the matched
/// bytes on success, `None` on no match (scanner is left unchanged).
fn try_match<R: Read>(
    scanner: &mut Scanner<R>,
    set: &EquivalenceSet,
) -> Result<Option<Vec<u8>>, ParseError> {
    scanner.set_lookahead(0);
    let n = read_bytes(scanner, set, false)?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(scanner.matched().to_vec()))
    }
}

fn is_escaped_binary_byte(byte: u8) -> bool {
    !matches!(byte, 0x09 | 0x0A | 0x0D | 0x20..=0x7E)
}

/// Drives a single parse of one stream against one [`ParserConfig`].
/// Single-threaded, synchronous: one `parse` call runs to completion on the
/// caller's thread, per spec's cooperative concurrency model.
pub struct Parser<R> {
    scanner: Scanner<R>,
    config: ParserConfig,
    line: usize,
    column: usize,
    tracing_sink: TracingSink,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R, config: ParserConfig) -> Self {
        let min_buf_size = (config.max_sequence_len().max(1) * 4).max(64);
        Parser {
            scanner: Scanner::new(reader, min_buf_size),
            config,
            line: 1,
            column: 1,
            tracing_sink: TracingSink,
        }
    }

    fn advance(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn advance_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.advance(b);
        }
    }

    fn report<C: ParserCallbacks>(
        &mut self,
        callbacks: &mut C,
        code: DiagnosticCode,
        level: DiagnosticLevel,
        params: Vec<String>,
    ) {
        let diagnostic = Diagnostic {
            code,
            level,
            params: params.clone(),
        };
        self.tracing_sink.emit(&diagnostic);
        callbacks.log(code, level, &params);
    }

    /// Run the state machine to completion. `has_header` selects whether
    /// the first emitted row goes through [`ParserCallbacks::header`]
    /// (`true`) or is treated as an ordinary record (`false`).
    #[instrument(skip_all)]
    pub fn parse<C: ParserCallbacks>(
        &mut self,
        callbacks: &mut C,
        has_header: bool,
    ) -> Result<Outcome, ParseError> {
        let mut state = State::RowStart;
        let mut expected_columns: Option<usize> = match self.config.field_columns {
            ColumnPolicy::Exact(n) => Some(n),
            _ => None,
        };
        let mut rows_seen: usize = 0;

        let mut row_fields: Vec<Vec<u8>> = Vec::new();
        let mut current_field: Vec<u8> = Vec::new();
        let mut field_pending = false;

        loop {
            match state {
                State::RowStart => {
                    if self.scanner.eof() {
                        state = State::Eof;
                        continue;
                    }
                    row_fields.clear();
                    current_field.clear();
                    field_pending = false;
                    state = State::FieldStart;
                }

                State::FieldStart => {
                    let mut matched_open = None;
                    for (ix, pair) in self.config.escape_pairs.iter().enumerate() {
                        if let Some(bytes) = try_match(&mut self.scanner, &pair.open)? {
                            matched_open = Some((ix, bytes));
                            break;
                        }
                    }
                    if let Some((ix, bytes)) = matched_open {
                        self.advance_all(&bytes);
                        current_field.clear();
                        state = State::InEscapedField(ix);
                        continue;
                    }

                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.record_delimiters)? {
                        self.advance_all(&bytes);
                        let at_fresh_row_start =
                            row_fields.is_empty() && current_field.is_empty() && !field_pending;
                        if !at_fresh_row_start {
                            row_fields.push(std::mem::take(&mut current_field));
                        }
                        if !self.emit_row(
                            callbacks,
                            &mut row_fields,
                            has_header,
                            &mut rows_seen,
                            &mut expected_columns,
                        )? {
                            return Ok(Outcome::UserAborted);
                        }
                        state = State::RowStart;
                        continue;
                    }

                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.field_delimiters)? {
                        self.advance_all(&bytes);
                        row_fields.push(std::mem::take(&mut current_field));
                        field_pending = true;
                        state = State::FieldStart;
                        continue;
                    }

                    if self.scanner.eof() {
                        state = State::Eof;
                        continue;
                    }

                    state = State::InRawField;
                }

                State::InRawField => {
                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.record_delimiters)? {
                        self.advance_all(&bytes);
                        row_fields.push(std::mem::take(&mut current_field));
                        if !self.emit_row(
                            callbacks,
                            &mut row_fields,
                            has_header,
                            &mut rows_seen,
                            &mut expected_columns,
                        )? {
                            return Ok(Outcome::UserAborted);
                        }
                        state = State::RowStart;
                        continue;
                    }

                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.field_delimiters)? {
                        self.advance_all(&bytes);
                        row_fields.push(std::mem::take(&mut current_field));
                        field_pending = true;
                        state = State::FieldStart;
                        continue;
                    }

                    match self.scanner.getc()? {
                        None => {
                            row_fields.push(std::mem::take(&mut current_field));
                            if !row_fields.is_empty() {
                                if !self.emit_row(
                                    callbacks,
                                    &mut row_fields,
                                    has_header,
                                    &mut rows_seen,
                                    &mut expected_columns,
                                )? {
                                    return Ok(Outcome::UserAborted);
                                }
                            }
                            state = State::Eof;
                        }
                        Some(byte) => {
                            self.advance(byte);
                            current_field.push(byte);
                        }
                    }
                }

                State::InEscapedField(ix) => {
                    // `ParserConfigBuilder::build` rejects a close set whose
                    // members don't all share one base length, so reading it
                    // off the first member is safe no matter which member the
                    // matcher actually matched.
                    let base_len = {
                        let close = &self.config.escape_pairs[ix].close;
                        close.members().first().map(|m| m.base.len()).unwrap_or(1)
                    };

                    let close_match = {
                        let close = &self.config.escape_pairs[ix].close;
                        try_match(&mut self.scanner, close)?
                    };

                    if let Some(bytes) = close_match {
                        self.advance_all(&bytes);
                        let occurrences = (bytes.len() / base_len).max(1);
                        let literal_copies = if occurrences % 2 == 1 {
                            (occurrences - 1) / 2
                        } else {
                            occurrences / 2
                        };
                        // Every close member shares one base length (enforced at
                        // `ParserConfigBuilder::build`), so each literal pair's
                        // first occurrence can be read straight out of the bytes
                        // that actually matched, regardless of which specific
                        // member matched at that position.
                        for i in 0..literal_copies {
                            let start = 2 * i * base_len;
                            current_field.extend_from_slice(&bytes[start..start + base_len]);
                        }

                        if occurrences % 2 == 1 {
                            state = State::AfterField;
                        }
                        continue;
                    }

                    match self.scanner.getc()? {
                        None => {
                            self.report(
                                callbacks,
                                DiagnosticCode::UnterminatedEscape,
                                DiagnosticLevel::Error,
                                vec![format!("line={}", self.line), format!("col={}", self.column)],
                            );
                            return Err(ParseError::UnterminatedEscape {
                                line: self.line,
                                col: self.column,
                            });
                        }
                        Some(byte) => {
                            if !self.config.allow_escaped_binary && is_escaped_binary_byte(byte) {
                                self.report(
                                    callbacks,
                                    DiagnosticCode::UnexpectedBinary,
                                    DiagnosticLevel::Warning,
                                    vec![
                                        format!("line={}", self.line),
                                        format!("col={}", self.column),
                                        format!("byte={byte:#04x}"),
                                    ],
                                );
                            }
                            self.advance(byte);
                            current_field.push(byte);
                        }
                    }
                }

                State::AfterField => {
                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.record_delimiters)? {
                        self.advance_all(&bytes);
                        row_fields.push(std::mem::take(&mut current_field));
                        if !self.emit_row(
                            callbacks,
                            &mut row_fields,
                            has_header,
                            &mut rows_seen,
                            &mut expected_columns,
                        )? {
                            return Ok(Outcome::UserAborted);
                        }
                        state = State::RowStart;
                        continue;
                    }

                    if let Some(bytes) = try_match(&mut self.scanner, &self.config.field_delimiters)? {
                        self.advance_all(&bytes);
                        row_fields.push(std::mem::take(&mut current_field));
                        field_pending = true;
                        state = State::FieldStart;
                        continue;
                    }

                    if self.scanner.eof() {
                        row_fields.push(std::mem::take(&mut current_field));
                        if !self.emit_row(
                            callbacks,
                            &mut row_fields,
                            has_header,
                            &mut rows_seen,
                            &mut expected_columns,
                        )? {
                            return Ok(Outcome::UserAborted);
                        }
                        state = State::Eof;
                        continue;
                    }

                    let (line, col) = (self.line, self.column);
                    self.report(
                        callbacks,
                        DiagnosticCode::SyntaxError,
                        DiagnosticLevel::Error,
                        vec![format!("line={line}"), format!("col_start={col}"), format!("col_end={col}")],
                    );
                    return Err(ParseError::Syntax {
                        line,
                        col_start: col,
                        col_end: col,
                    });
                }

                State::Eof => {
                    trace!(rows_seen, "parse complete");
                    return Ok(Outcome::Ok);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_row<C: ParserCallbacks>(
        &mut self,
        callbacks: &mut C,
        row_fields: &mut Vec<Vec<u8>>,
        has_header: bool,
        rows_seen: &mut usize,
        expected_columns: &mut Option<usize>,
    ) -> Result<bool, ParseError> {
        let actual = row_fields.len();
        let line = self.line;

        match self.config.field_columns {
            ColumnPolicy::Exact(expected) => {
                if actual != expected {
                    self.report(
                        callbacks,
                        DiagnosticCode::ColumnCountError,
                        DiagnosticLevel::Error,
                        vec![
                            format!("line={line}"),
                            format!("expected={expected}"),
                            format!("actual={actual}"),
                        ],
                    );
                    return Err(ParseError::ColumnCount {
                        line,
                        expected,
                        actual,
                    });
                }
            }
            ColumnPolicy::Unset => match *expected_columns {
                None => *expected_columns = Some(actual),
                Some(expected) if expected != actual => {
                    self.report(
                        callbacks,
                        DiagnosticCode::ColumnCountError,
                        DiagnosticLevel::Error,
                        vec![
                            format!("line={line}"),
                            format!("expected={expected}"),
                            format!("actual={actual}"),
                        ],
                    );
                    return Err(ParseError::ColumnCount {
                        line,
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            },
            ColumnPolicy::Permissive => {
                if let Some(expected) = *expected_columns {
                    if expected != actual {
                        self.report(
                            callbacks,
                            DiagnosticCode::ColumnCountError,
                            DiagnosticLevel::Warning,
                            vec![
                                format!("line={line}"),
                                format!("expected={expected}"),
                                format!("actual={actual}"),
                            ],
                        );
                    }
                } else {
                    *expected_columns = Some(actual);
                }
            }
        }

        let slices: Vec<&[u8]> = row_fields.iter().map(|f| f.as_slice()).collect();
        let is_header = has_header && *rows_seen == 0;
        *rows_seen += 1;

        let keep_going = if is_header {
            callbacks.header(&slices)
        } else {
            callbacks.record(&slices)
        };

        Ok(keep_going)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnPolicy, NewlineMode};
    use std::io::Cursor;

    #[derive(Default)]
    struct Capture {
        headers: Vec<Vec<Vec<u8>>>,
        records: Vec<Vec<Vec<u8>>>,
        logs: Vec<(DiagnosticCode, DiagnosticLevel)>,
    }

    impl ParserCallbacks for Capture {
        fn header(&mut self, fields: &[&[u8]]) -> bool {
            self.headers.push(fields.iter().map(|f| f.to_vec()).collect());
            true
        }

        fn record(&mut self, fields: &[&[u8]]) -> bool {
            self.records.push(fields.iter().map(|f| f.to_vec()).collect());
            true
        }

        fn log(&mut self, code: DiagnosticCode, level: DiagnosticLevel, _params: &[String]) {
            self.logs.push((code, level));
        }
    }

    fn parse_all(input: &[u8], config: ParserConfig, has_header: bool) -> (Outcome, Capture) {
        let mut parser = Parser::new(Cursor::new(input.to_vec()), config);
        let mut cap = Capture::default();
        let outcome = parser.parse(&mut cap, has_header).unwrap();
        (outcome, cap)
    }

    #[test]
    fn scenario_basic_header_and_record() {
        let config = ParserConfig::builder().build().unwrap();
        let (outcome, cap) = parse_all(b"a,b,c\r\na,b,c\r\n", config, true);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(cap.headers, vec![vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]]);
        assert_eq!(cap.records, vec![vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]]);
    }

    #[test]
    fn scenario_doubled_quote_escaping() {
        let config = ParserConfig::builder().build().unwrap();
        let (outcome, cap) = parse_all(b"\"hello, world\",\"quoted \"\"q\"\"\"\r\n", config, true);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(
            cap.headers,
            vec![vec![b"hello, world".to_vec(), b"quoted \"q\"".to_vec()]]
        );
    }

    #[test]
    fn scenario_column_count_mismatch_under_unset_policy() {
        let config = ParserConfig::builder().build().unwrap();
        let mut parser = Parser::new(Cursor::new(b"a,b\r\na,b,c\r\n".to_vec()), config);
        let mut cap = Capture::default();
        let err = parser.parse(&mut cap, true).unwrap_err();
        match err {
            ParseError::ColumnCount { line, expected, actual } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("expected ColumnCount, got {other:?}"),
        }
    }

    #[test]
    fn scenario_exclusive_space_or_tab_delimiter() {
        let config = ParserConfig::builder()
            .field_delimiters(&[(b" ", false), (b"\t", false)], true)
            .build()
            .unwrap();
        let (outcome, cap) = parse_all(b"a\tb\r\nc\td\r\n", config, true);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(cap.headers, vec![vec![b"a".to_vec(), b"b".to_vec()]]);
        assert_eq!(cap.records, vec![vec![b"c".to_vec(), b"d".to_vec()]]);
    }

    #[test]
    fn scenario_unterminated_quote_reports_location() {
        let config = ParserConfig::builder().build().unwrap();
        let mut parser = Parser::new(Cursor::new(b"a,b\r\n\"abc\r\n".to_vec()), config);
        let mut cap = Capture::default();
        let err = parser.parse(&mut cap, true).unwrap_err();
        match err {
            ParseError::UnterminatedEscape { line, .. } => assert_eq!(line, 3),
            other => panic!("expected UnterminatedEscape, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_yields_no_callbacks() {
        let config = ParserConfig::builder().build().unwrap();
        let (outcome, cap) = parse_all(b"", config, true);
        assert_eq!(outcome, Outcome::Ok);
        assert!(cap.headers.is_empty());
        assert!(cap.records.is_empty());
    }

    #[test]
    fn lone_record_delimiter_is_a_zero_field_row() {
        let config = ParserConfig::builder().build().unwrap();
        let (outcome, cap) = parse_all(b"\r\n", config, false);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(cap.records, vec![Vec::<Vec<u8>>::new()]);
    }

    #[test]
    fn trailing_delimiter_produces_extra_empty_field() {
        let config = ParserConfig::builder().build().unwrap();
        let (outcome, cap) = parse_all(b"a,b,\r\n", config, false);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(
            cap.records,
            vec![vec![b"a".to_vec(), b"b".to_vec(), b"".to_vec()]]
        );
    }

    #[test]
    fn no_trailing_newline_parses_same_as_with_one() {
        let config = ParserConfig::builder().build().unwrap();
        let (_, with_nl) = parse_all(b"a,b\r\n", ParserConfig::builder().build().unwrap(), false);
        let (_, without_nl) = parse_all(b"a,b", config, false);
        assert_eq!(with_nl.records, without_nl.records);
    }

    #[test]
    fn permissive_column_mismatch_warns_instead_of_failing() {
        let config = ParserConfig::builder()
            .field_columns(ColumnPolicy::Permissive)
            .build()
            .unwrap();
        let (outcome, cap) = parse_all(b"a,b\r\na,b,c\r\n", config, false);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(cap.records.len(), 2);
        assert!(cap
            .logs
            .iter()
            .any(|(code, level)| *code == DiagnosticCode::ColumnCountError
                && *level == DiagnosticLevel::Warning));
    }

    #[test]
    fn user_abort_stops_parsing_after_first_row() {
        struct Abort;
        impl ParserCallbacks for Abort {
            fn header(&mut self, _fields: &[&[u8]]) -> bool {
                true
            }
            fn record(&mut self, _fields: &[&[u8]]) -> bool {
                false
            }
        }
        let config = ParserConfig::builder().build().unwrap();
        let mut parser = Parser::new(Cursor::new(b"a,b\r\nc,d\r\ne,f\r\n".to_vec()), config);
        let mut cb = Abort;
        let outcome = parser.parse(&mut cb, false).unwrap();
        assert_eq!(outcome, Outcome::UserAborted);
    }

    #[test]
    fn crlf_strict_newline_mode_rejects_bare_lf_as_field_content() {
        let config = ParserConfig::builder()
            .newline_mode(NewlineMode::CrlfStrict)
            .build()
            .unwrap();
        let (outcome, cap) = parse_all(b"a\nb\r\n", config, false);
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(cap.records, vec![vec![b"a\nb".to_vec()]]);
    }
}
