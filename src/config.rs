// Parser configuration surface: the concrete contract the core consumes
// (spec §6), grounded in libdsv's `parser` class fields
// (`field_delimiters`, `delimiter_repeatflag`, `newline_behavior`,
// `field_columns`, `escaped_binary_fields`) and in the teacher's
// `decode_separators`/`decode_escape`/`decode_newlines` helpers for the
// shape of "what a caller configures". This is not the public C-ABI
// getter/setter surface (that remains an external collaborator); it's the
// minimal builder needed to hand a `Parser` its equivalence sets.

use crate::error::ConfigError;
use crate::sequence::EquivalenceSet;

/// Expands into a concrete `record_delimiters` equivalence set at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlineMode {
    /// `{"\r\n", "\n", "\r"}`, non-exclusive (longest-match resolves the
    /// shared `\r` / `\r\n` prefix). The default.
    Permissive,
    /// `{"\n"}` only.
    LfStrict,
    /// `{"\r\n"}` only.
    CrlfStrict,
}

impl Default for NewlineMode {
    fn default() -> Self {
        NewlineMode::Permissive
    }
}

/// Column-count enforcement policy (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPolicy {
    /// The first emitted row binds the expected count for the rest.
    Unset,
    /// Every row must have exactly this many fields.
    Exact(usize),
    /// Mismatches are warnings, not errors.
    Permissive,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        ColumnPolicy::Unset
    }
}

impl TryFrom<isize> for ColumnPolicy {
    type Error = ConfigError;

    fn try_from(value: isize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ColumnPolicy::Unset),
            -1 => Ok(ColumnPolicy::Permissive),
            n if n > 0 => Ok(ColumnPolicy::Exact(n as usize)),
            other => Err(ConfigError::InvalidColumnCount(other)),
        }
    }
}

/// Paired open/close equivalence sets bracketing an escaped field. The
/// close set's own `repeat_any` flag is what implements the doubled-quote
/// convention: an odd run of consecutive close matches closes the field
/// (after re-inserting `(run - 1) / 2` literal copies), an even run stays
/// inside the field.
#[derive(Debug, Clone)]
pub struct EscapePair {
    pub open: EquivalenceSet,
    pub close: EquivalenceSet,
}

/// Members accumulated by the builder before compilation into an
/// `EquivalenceSet`. Kept as plain data so `.build()` is the single place
/// compilation (and its failure mode) happens.
#[derive(Debug, Clone)]
struct DelimSpec {
    members: Vec<(Vec<u8>, bool)>,
    exclusive: bool,
}

impl DelimSpec {
    fn single(bytes: &[u8]) -> Self {
        DelimSpec {
            members: vec![(bytes.to_vec(), false)],
            exclusive: false,
        }
    }

    fn compile(&self) -> Result<EquivalenceSet, ConfigError> {
        let members: Vec<(&[u8], bool)> = self
            .members
            .iter()
            .map(|(b, r)| (b.as_slice(), *r))
            .collect();
        EquivalenceSet::new(&members, self.exclusive)
    }
}

fn newline_spec(mode: NewlineMode) -> DelimSpec {
    match mode {
        NewlineMode::Permissive => DelimSpec {
            members: vec![
                (b"\r\n".to_vec(), false),
                (b"\n".to_vec(), false),
                (b"\r".to_vec(), false),
            ],
            exclusive: false,
        },
        NewlineMode::LfStrict => DelimSpec::single(b"\n"),
        NewlineMode::CrlfStrict => DelimSpec::single(b"\r\n"),
    }
}

struct EscapeSpec {
    open: DelimSpec,
    close_members: Vec<(Vec<u8>, bool)>,
    close_exclusive: bool,
}

/// Builds a [`ParserConfig`]. Defaults: field delimiter `,`, record
/// delimiters per [`NewlineMode::Permissive`], one escape pair `("\"",
/// "\"")` with the doubled-quote convention, `field_columns` unbound, and
/// escaped binary content disallowed.
pub struct ParserConfigBuilder {
    field: DelimSpec,
    record: DelimSpec,
    escapes: Vec<EscapeSpec>,
    field_columns: ColumnPolicy,
    allow_escaped_binary: bool,
}

impl Default for ParserConfigBuilder {
    fn default() -> Self {
        ParserConfigBuilder {
            field: DelimSpec::single(b","),
            record: newline_spec(NewlineMode::Permissive),
            escapes: vec![EscapeSpec {
                open: DelimSpec::single(b"\""),
                close_members: vec![(b"\"".to_vec(), true)],
                close_exclusive: false,
            }],
            field_columns: ColumnPolicy::Unset,
            allow_escaped_binary: false,
        }
    }
}

impl ParserConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the field delimiter with a single non-repeating sequence.
    pub fn field_delimiter(mut self, bytes: &[u8]) -> Self {
        self.field = DelimSpec::single(bytes);
        self
    }

    /// Replace the field delimiters with a full multi-member equivalence
    /// set description.
    pub fn field_delimiters(mut self, members: &[(&[u8], bool)], exclusive: bool) -> Self {
        self.field = DelimSpec {
            members: members.iter().map(|(b, r)| (b.to_vec(), *r)).collect(),
            exclusive,
        };
        self
    }

    /// Replace the record delimiters with a full multi-member equivalence
    /// set description. Overrides any prior `newline_mode` call.
    pub fn record_delimiters(mut self, members: &[(&[u8], bool)], exclusive: bool) -> Self {
        self.record = DelimSpec {
            members: members.iter().map(|(b, r)| (b.to_vec(), *r)).collect(),
            exclusive,
        };
        self
    }

    /// Convenience over `record_delimiters` for the common newline-handling
    /// cases. Overrides any prior `record_delimiters` call.
    pub fn newline_mode(mut self, mode: NewlineMode) -> Self {
        self.record = newline_spec(mode);
        self
    }

    /// Replace the escape pair list entirely. Each pair is
    /// `(open_members, open_exclusive, close_members, close_exclusive)`.
    pub fn escape_pairs(
        mut self,
        pairs: &[(&[(&[u8], bool)], bool, &[(&[u8], bool)], bool)],
    ) -> Self {
        self.escapes = pairs
            .iter()
            .map(|(open_members, open_exclusive, close_members, close_exclusive)| EscapeSpec {
                open: DelimSpec {
                    members: open_members.iter().map(|(b, r)| (b.to_vec(), *r)).collect(),
                    exclusive: *open_exclusive,
                },
                close_members: close_members.iter().map(|(b, r)| (b.to_vec(), *r)).collect(),
                close_exclusive: *close_exclusive,
            })
            .collect();
        self
    }

    /// Convenience for the common single-byte-sequence quote pair, with the
    /// doubled-quote-as-literal-quote convention (the close set repeats).
    pub fn escape_pair(mut self, open: &[u8], close: &[u8]) -> Self {
        self.escapes = vec![EscapeSpec {
            open: DelimSpec::single(open),
            close_members: vec![(close.to_vec(), true)],
            close_exclusive: false,
        }];
        self
    }

    pub fn field_columns(mut self, policy: ColumnPolicy) -> Self {
        self.field_columns = policy;
        self
    }

    pub fn allow_escaped_binary(mut self, flag: bool) -> Self {
        self.allow_escaped_binary = flag;
        self
    }

    pub fn build(self) -> Result<ParserConfig, ConfigError> {
        let field_delimiters = self.field.compile()?;
        let record_delimiters = self.record.compile()?;

        let mut escape_pairs = Vec::with_capacity(self.escapes.len());
        for spec in &self.escapes {
            let open = spec.open.compile()?;

            if let Some(first_len) = spec.close_members.first().map(|(b, _)| b.len()) {
                if spec.close_members.iter().any(|(b, _)| b.len() != first_len) {
                    return Err(ConfigError::MixedEscapeCloseLength);
                }
            }

            let close_members: Vec<(&[u8], bool)> = spec
                .close_members
                .iter()
                .map(|(b, r)| (b.as_slice(), *r))
                .collect();
            let close = EquivalenceSet::new(&close_members, spec.close_exclusive)?;
            escape_pairs.push(EscapePair { open, close });
        }

        Ok(ParserConfig {
            field_delimiters,
            record_delimiters,
            escape_pairs,
            field_columns: self.field_columns,
            allow_escaped_binary: self.allow_escaped_binary,
        })
    }
}

/// The compiled configuration a [`crate::parser::Parser`] is driven by.
/// Immutable once built; reusable across parses.
pub struct ParserConfig {
    pub field_delimiters: EquivalenceSet,
    pub record_delimiters: EquivalenceSet,
    pub escape_pairs: Vec<EscapePair>,
    pub field_columns: ColumnPolicy,
    pub allow_escaped_binary: bool,
}

impl ParserConfig {
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::new()
    }

    /// The largest base-sequence length across every configured
    /// equivalence set, used to size the scanner's minimum buffer.
    pub fn max_sequence_len(&self) -> usize {
        let mut max = self
            .field_delimiters
            .max_base_len()
            .max(self.record_delimiters.max_base_len());
        for pair in &self.escape_pairs {
            max = max.max(pair.open.max_base_len()).max(pair.close.max_base_len());
        }
        max
    }
}
