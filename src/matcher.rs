// Matcher (read_bytes): given a scanner and an equivalence set, consume the
// longest (possibly repeated) match starting at the scanner's current read
// cursor. Ported from libdsv's read_bytes.h, recast from computed-goto into
// an explicit labeled-loop state machine.

use std::io::Read;

use crate::error::ParseError;
use crate::scanner::Scanner;
use crate::sequence::EquivalenceSet;

/// Attempt to match `equiv` at the scanner's current position.
///
/// Returns the total number of bytes matched (`0` means no match and the
/// scanner is unchanged). On success, the matched bytes sit in the
/// scanner's putback region; on partial or no match, the read cursor is
/// restored to where it started.
pub fn read_bytes<R: Read>(
    scanner: &mut Scanner<R>,
    equiv: &EquivalenceSet,
    repeat_outer: bool,
) -> Result<usize, ParseError> {
    let repeat = repeat_outer || equiv.repeat_any();

    if let Some(literal) = equiv.single_shortcut() {
        return read_literal(scanner, literal, repeat);
    }

    read_chunks(scanner, equiv.chunks(), repeat)
}

fn read_literal<R: Read>(
    scanner: &mut Scanner<R>,
    literal: &[u8],
    repeat: bool,
) -> Result<usize, ParseError> {
    let mut result = 0usize;

    loop {
        let mut read_so_far = 0usize;
        let mut cur = 0usize;

        while cur < literal.len() {
            match scanner.getc()? {
                Some(b) => {
                    read_so_far += 1;
                    if b == literal[cur] {
                        cur += 1;
                    } else {
                        break;
                    }
                }
                None => break,
            }
        }

        if cur != literal.len() {
            scanner.putback(read_so_far);
            break;
        }

        result += literal.len();

        if !repeat || scanner.eof() {
            break;
        }
    }

    Ok(result)
}

fn read_chunks<R: Read>(
    scanner: &mut Scanner<R>,
    chunks: &[crate::sequence::DispatchChunk],
    repeat_outer: bool,
) -> Result<usize, ParseError> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let mut result: usize = 0;

    'outer: loop {
        let mut chunk_ix: usize = 0;
        let mut read_so_far: usize = 0;

        'read: loop {
            let byte = match scanner.getc()? {
                Some(b) => b,
                None => {
                    scanner.putback(read_so_far);
                    return Ok(result);
                }
            };
            read_so_far += 1;

            loop {
                let chunk = chunks[chunk_ix];

                if byte != chunk.byte {
                    if chunk.fail_skip == 0 {
                        scanner.putback(read_so_far);
                        return Ok(result);
                    }
                    chunk_ix += chunk.fail_skip as usize;
                    continue;
                }

                if chunk.accept {
                    result += read_so_far;
                    read_so_far = 0;
                }

                if chunk.pass_skip != 0 {
                    chunk_ix = (chunk_ix as isize + chunk.pass_skip as isize) as usize;
                    continue 'read;
                }

                if repeat_outer {
                    continue 'outer;
                }

                debug_assert_eq!(read_so_far, 0);
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner_of(bytes: &[u8]) -> Scanner<Cursor<Vec<u8>>> {
        Scanner::new(Cursor::new(bytes.to_vec()), 64)
    }

    #[test]
    fn matches_single_literal() {
        let equiv = EquivalenceSet::new(&[(b",", false)], false).unwrap();
        let mut s = scanner_of(b",rest");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 1);
        assert_eq!(s.matched(), b",");
    }

    #[test]
    fn no_match_restores_cursor() {
        let equiv = EquivalenceSet::new(&[(b",", false)], false).unwrap();
        let mut s = scanner_of(b"xrest");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 0);
        // cursor restored: next getc still sees 'x'
        assert_eq!(s.getc().unwrap(), Some(b'x'));
    }

    #[test]
    fn matches_longest_among_compiled_set() {
        let equiv = EquivalenceSet::new(&[(b"\r\n", false), (b"\n", false), (b"\r", false)], false).unwrap();
        let mut s = scanner_of(b"\r\nrest");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 2);
        assert_eq!(s.matched(), b"\r\n");
    }

    #[test]
    fn bare_cr_matches_when_no_lf_follows() {
        let equiv = EquivalenceSet::new(&[(b"\r\n", false), (b"\n", false), (b"\r", false)], false).unwrap();
        let mut s = scanner_of(b"\rX");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 1);
        assert_eq!(s.matched(), b"\r");
    }

    #[test]
    fn repeating_member_consumes_all_consecutive_occurrences() {
        let equiv = EquivalenceSet::new(&[(b"\"", true)], false).unwrap();
        let mut s = scanner_of(b"\"\"\"X");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 3);
        assert_eq!(s.matched(), b"\"\"\"");
        assert_eq!(s.getc().unwrap(), Some(b'X'));
    }

    #[test]
    fn single_sequence_shortcut_and_compiled_path_agree() {
        let shortcut = EquivalenceSet::new(&[(b"::", false)], false).unwrap();
        let compiled = EquivalenceSet::new(&[(b"::", false)], true).unwrap();

        for input in [&b"::rest"[..], &b"x"[..], &b":x"[..]] {
            let mut s1 = scanner_of(input);
            s1.set_lookahead(0);
            let n1 = read_bytes(&mut s1, &shortcut, false).unwrap();

            let mut s2 = scanner_of(input);
            s2.set_lookahead(0);
            let n2 = read_bytes(&mut s2, &compiled, false).unwrap();

            assert_eq!(n1, n2, "mismatch for input {:?}", input);
        }
    }

    #[test]
    fn partial_match_is_fully_restored() {
        let equiv = EquivalenceSet::new(&[(b"foobar", false), (b"foobaz", false)], true).unwrap();
        let mut s = scanner_of(b"fooqux");
        s.set_lookahead(0);
        let n = read_bytes(&mut s, &equiv, false).unwrap();
        assert_eq!(n, 0);
        let mut readback = Vec::new();
        for _ in 0..6 {
            readback.push(s.getc().unwrap().unwrap());
        }
        assert_eq!(readback, b"fooqux");
    }
}
