// dsvcore — streaming DSV (delimiter-separated-value) parsing core.
//
// Compiles configurable, possibly multi-byte field/record delimiters and
// escape markers into a branchless dispatch-table matcher, scans an
// arbitrary byte stream through a bounded three-region buffer, and drives
// a small explicit state machine that emits header/record callbacks while
// enforcing column-count consistency and tracking byte-precise
// diagnostic locations.
//
// No unwrap/expect in non-test code. Fallible paths return `Result` and
// propagate with `?`.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod scanner;
pub mod sequence;

pub use config::{ColumnPolicy, EscapePair, NewlineMode, ParserConfig, ParserConfigBuilder};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticLevel, DiagnosticSink, TracingSink};
pub use error::{ConfigError, ParseError};
pub use matcher::read_bytes;
pub use parser::{Outcome, Parser, ParserCallbacks};
pub use scanner::Scanner;
pub use sequence::{ByteSequenceDesc, DispatchChunk, EquivalenceSet};
