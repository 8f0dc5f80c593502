// ByteSequence compiler and equivalence sets.
//
// Compiles a list of candidate byte sequences (field/record delimiters,
// escape markers), any of which may be flagged repeatable, into a flat
// dispatch table that performs single-pass longest-prefix matching with
// negative back-skips for repeats. Ported from the goto-free recasting of
// libdsv's bytesequence_compiler.h / equiv_bytesequence.h.

use crate::error::ConfigError;

/// The user's literal byte sequence, plus the normalized form the compiler
/// actually builds a trie over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSequenceDesc {
    pub base: Vec<u8>,
    pub normalized: Vec<u8>,
    pub repeat: bool,
}

impl ByteSequenceDesc {
    fn new(base: &[u8], repeat: bool) -> Self {
        ByteSequenceDesc {
            base: base.to_vec(),
            normalized: base.to_vec(),
            repeat,
        }
    }
}

/// One entry of the compiled matcher table.
///
/// At position `i`: if the input byte equals `byte`, advance the input; if
/// `accept`, a complete base sequence has just been consumed; then jump by
/// `pass_skip` (negative for a repeat back-loop, zero to finish). Otherwise,
/// do not advance the input and jump by `fail_skip` (`0` means reject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchChunk {
    pub byte: u8,
    pub accept: bool,
    pub pass_skip: i32,
    pub fail_skip: u32,
}

/// True iff `whole` consists of one or more whole repetitions of `pattern`.
fn is_repetitive(pattern: &[u8], whole: &[u8]) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let mut idx = 0;
    while idx < whole.len() {
        let mut p = 0;
        while p < pattern.len() && idx < whole.len() && pattern[p] == whole[idx] {
            p += 1;
            idx += 1;
        }
        if p != pattern.len() {
            return false;
        }
    }
    true
}

/// Extend every repeating member's `normalized` sequence until its tail
/// (the `base`-length stub that a repeat back-jump re-enters) shares no byte
/// position with any other member. Fails if a repeating member's normalized
/// form turns out to be a whole-multiple repetition of another member's.
fn normalize(descs: &mut [ByteSequenceDesc]) -> Result<(), ConfigError> {
    let mut recheck = true;
    while recheck {
        recheck = false;

        for cur_ix in 0..descs.len() {
            if !descs[cur_ix].repeat {
                continue;
            }

            for insp_ix in 0..descs.len() {
                if insp_ix == cur_ix {
                    continue;
                }

                let cur_norm = descs[cur_ix].normalized.clone();
                let insp_norm = descs[insp_ix].normalized.clone();

                if is_repetitive(&cur_norm, &insp_norm) {
                    return Err(ConfigError::AmbiguousRepetition);
                }

                let shared_len = cur_norm
                    .iter()
                    .zip(insp_norm.iter())
                    .take_while(|(a, b)| a == b)
                    .count();

                if shared_len > cur_norm.len() - descs[cur_ix].base.len() {
                    let base = descs[cur_ix].base.clone();
                    descs[cur_ix].normalized.extend_from_slice(&base);
                    recheck = true;
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Compile the first (normalized) sequence of an equivalence set into a
/// straight dispatch chain, with a repeat back-jump on its final chunk when
/// `repeat` is set.
fn assign_bytes(normalized: &[u8], base_len: usize, repeat: bool) -> Vec<DispatchChunk> {
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(normalized.len());
    for (i, &byte) in normalized.iter().enumerate() {
        let accept = (i + 1) % base_len == 0;
        result.push(DispatchChunk {
            byte,
            accept,
            pass_skip: 1,
            fail_skip: 0,
        });
    }

    if let Some(last) = result.last_mut() {
        last.pass_skip = if repeat { -(base_len as i32) } else { 0 };
    }

    result
}

/// Merge an additional normalized sequence into an existing dispatch table,
/// sharing any common prefix nodes and appending fresh chunks where the
/// existing trie runs out of alternatives.
fn compile_bytes(normalized: &[u8], base_len: usize, repeat: bool, chunks: &mut Vec<DispatchChunk>) {
    #[derive(Clone, Copy, PartialEq)]
    enum TestResult {
        None,
        Pass,
        Fail,
    }

    const SENTINEL: usize = usize::MAX;

    let mut byte_off: usize = 0;
    let mut last_off: usize = SENTINEL;
    let mut test_result = TestResult::None;
    let mut first = 0usize;

    while first < normalized.len() {
        if last_off == byte_off {
            let new_off = chunks.len();
            let accept = (first + 1) % base_len == 0;
            chunks.push(DispatchChunk {
                byte: normalized[first],
                accept,
                pass_skip: 0,
                fail_skip: 0,
            });

            match test_result {
                TestResult::Pass => chunks[last_off].pass_skip = (new_off - last_off) as i32,
                TestResult::Fail => chunks[last_off].fail_skip = (new_off - last_off) as u32,
                TestResult::None => {}
            }

            last_off = new_off;
            test_result = TestResult::Pass;
            first += 1;
        } else if chunks[byte_off].byte == normalized[first] {
            first += 1;
            last_off = byte_off;

            if first % base_len == 0 {
                chunks[byte_off].accept = true;
            }

            byte_off = (byte_off as isize + chunks[byte_off].pass_skip as isize) as usize;
            test_result = TestResult::Pass;
        } else {
            last_off = byte_off;
            byte_off += chunks[byte_off].fail_skip as usize;
            test_result = TestResult::Fail;
        }
    }

    if repeat {
        chunks[last_off].pass_skip = -(base_len as i32);
    }
}

/// Normalize then compile a full list of sequence descriptors into a single
/// dispatch table.
fn compile_seq(descs: &mut Vec<ByteSequenceDesc>) -> Result<Vec<DispatchChunk>, ConfigError> {
    if descs.is_empty() {
        return Ok(Vec::new());
    }

    normalize(descs)?;

    let mut chunks = assign_bytes(&descs[0].normalized, descs[0].base.len(), descs[0].repeat);

    for desc in &descs[1..] {
        compile_bytes(&desc.normalized, desc.base.len(), desc.repeat, &mut chunks);
    }

    Ok(chunks)
}

/// A set of base byte sequences any of which counts as a match for a given
/// role (field delimiter, record delimiter, escape open/close marker).
#[derive(Debug, Clone)]
pub struct EquivalenceSet {
    descs: Vec<ByteSequenceDesc>,
    chunks: Vec<DispatchChunk>,
    repeat_any: bool,
    exclusive: bool,
    single_shortcut: Option<Vec<u8>>,
}

impl EquivalenceSet {
    /// Build an equivalence set from `(bytes, repeat)` member descriptors.
    ///
    /// When the set has exactly one member and `exclusive` is false, a
    /// direct byte-slice shortcut is stored instead of compiling a
    /// single-branch dispatch table, mirroring libdsv's single-delimiter
    /// optimization.
    pub fn new(members: &[(&[u8], bool)], exclusive: bool) -> Result<Self, ConfigError> {
        if members.is_empty() || members.iter().any(|(b, _)| b.is_empty()) {
            return Err(ConfigError::EmptySequence);
        }

        let descs: Vec<ByteSequenceDesc> = members
            .iter()
            .map(|(b, r)| ByteSequenceDesc::new(b, *r))
            .collect();

        let repeat_any = descs.iter().any(|d| d.repeat);

        if members.len() == 1 && !exclusive {
            let (bytes, repeat) = members[0];
            return Ok(EquivalenceSet {
                descs,
                chunks: Vec::new(),
                repeat_any: repeat,
                exclusive: false,
                single_shortcut: Some(bytes.to_vec()),
            });
        }

        let mut descs = descs;
        let chunks = compile_seq(&mut descs)?;

        Ok(EquivalenceSet {
            descs,
            chunks,
            repeat_any,
            exclusive,
            single_shortcut: None,
        })
    }

    pub fn chunks(&self) -> &[DispatchChunk] {
        &self.chunks
    }

    pub fn single_shortcut(&self) -> Option<&[u8]> {
        self.single_shortcut.as_deref()
    }

    pub fn repeat_any(&self) -> bool {
        self.repeat_any
    }

    pub fn exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn members(&self) -> &[ByteSequenceDesc] {
        &self.descs
    }

    /// Byte length of the longest base member (used to size scanner
    /// buffers; the matcher never needs more putback than the longest
    /// normalized sequence, but callers size against the longest base to
    /// stay conservative without inspecting compiled internals).
    pub fn max_base_len(&self) -> usize {
        self.descs.iter().map(|d| d.base.len()).max().unwrap_or(0)
    }
}
