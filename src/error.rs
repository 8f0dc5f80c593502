// Error types for configuration and parsing faults.

use thiserror::Error;

/// Faults detected while building an [`crate::sequence::EquivalenceSet`] or a
/// [`crate::config::ParserConfig`]. These abort construction and leave no
/// partial state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "a repeating byte sequence is a whole-multiple repetition of another \
         member of the same equivalence set"
    )]
    AmbiguousRepetition,

    #[error("byte sequence members must not be empty")]
    EmptySequence,

    #[error("invalid column count policy value: {0}")]
    InvalidColumnCount(isize),

    #[error("an escape pair's close sequence members must all share one base byte length")]
    MixedEscapeCloseLength,
}

/// Faults raised while driving a parse to completion.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("i/o error during parse: {0}")]
    Io(#[from] std::io::Error),

    #[error("syntax error at line {line}, columns {col_start}..{col_end}")]
    Syntax {
        line: usize,
        col_start: usize,
        col_end: usize,
    },

    #[error("unterminated escape starting at line {line}, column {col}")]
    UnterminatedEscape { line: usize, col: usize },

    #[error("column count mismatch at line {line}: expected {expected}, got {actual}")]
    ColumnCount {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("out of memory")]
    OutOfMemory,
}
