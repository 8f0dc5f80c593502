// Diagnostic channel: structured (code, level, params) tuples surfaced to a
// caller-chosen sink, synchronously and in parser-event order. Ported from
// libdsv's parser.h log_description/dsv_log_level/append_log plumbing.

use tracing::{debug, error, warn};

/// Identifies the kind of fault or note a diagnostic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    SyntaxError,
    ColumnCountError,
    UnexpectedBinary,
    UnterminatedEscape,
}

/// Severity of a diagnostic. Filtering against a configured mask is the
/// sink's responsibility, not the channel's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One structured diagnostic: a code, a severity, and stringified params
/// (locations, counts) whose rendering is left entirely to the sink.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub level: DiagnosticLevel,
    pub params: Vec<String>,
}

/// Receives diagnostics as they're discovered, in parser-event order.
///
/// A default no-op implementation exists so callers who don't care about
/// diagnostics aren't forced to wire one up; `TracingSink` is provided for
/// callers who want crate-internal observability without writing their own.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: &Diagnostic);
}

impl DiagnosticSink for () {
    fn emit(&mut self, _diagnostic: &Diagnostic) {}
}

/// Forwards diagnostics into `tracing` at a level matching their severity.
/// This is the channel's own internal observability, separate from whatever
/// sink the embedding caller supplies via [`crate::parser::ParserCallbacks`].
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        let params = diagnostic.params.join(", ");
        match diagnostic.level {
            DiagnosticLevel::Error => error!(code = ?diagnostic.code, %params, "parse fault"),
            DiagnosticLevel::Warning => warn!(code = ?diagnostic.code, %params, "parse warning"),
            DiagnosticLevel::Info => debug!(code = ?diagnostic.code, %params, "parse note"),
            DiagnosticLevel::Debug => debug!(code = ?diagnostic.code, %params, "parse trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording(Vec<Diagnostic>);

    impl DiagnosticSink for Recording {
        fn emit(&mut self, diagnostic: &Diagnostic) {
            self.0.push(diagnostic.clone());
        }
    }

    #[test]
    fn recording_sink_preserves_order() {
        let mut sink = Recording::default();
        sink.emit(&Diagnostic {
            code: DiagnosticCode::ColumnCountError,
            level: DiagnosticLevel::Warning,
            params: vec!["line=2".into(), "expected=2".into(), "actual=3".into()],
        });
        sink.emit(&Diagnostic {
            code: DiagnosticCode::SyntaxError,
            level: DiagnosticLevel::Error,
            params: vec!["line=3".into()],
        });
        assert_eq!(sink.0.len(), 2);
        assert_eq!(sink.0[0].code, DiagnosticCode::ColumnCountError);
        assert_eq!(sink.0[1].code, DiagnosticCode::SyntaxError);
    }

    #[test]
    fn level_ordering_matches_severity() {
        assert!(DiagnosticLevel::Debug < DiagnosticLevel::Info);
        assert!(DiagnosticLevel::Info < DiagnosticLevel::Warning);
        assert!(DiagnosticLevel::Warning < DiagnosticLevel::Error);
    }

    #[test]
    fn unit_sink_does_not_panic() {
        let mut sink = ();
        sink.emit(&Diagnostic {
            code: DiagnosticCode::UnexpectedBinary,
            level: DiagnosticLevel::Info,
            params: vec![],
        });
    }
}
