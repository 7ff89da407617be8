//! Sliding-window LZ77 coder.
//!
//! # Token layout
//!
//! Every token is 4 bytes: `back_position:u16 BE | match_length:u8 |
//! next_char:u8`.  `back_position` counts bytes backward from the cursor
//! to the match start, so a back reference may overlap the produced end
//! (`back_position = 1, match_length = 5` repeats the last byte five
//! times).  The output is always a whole number of tokens.
//!
//! # Stream termination
//!
//! The final decoded byte is always a sentinel and is dropped: when the
//! best match runs to the end of the input the last token carries NUL as
//! `next_char`; otherwise a terminator token `(0, 0, 0)` is appended.
//! Empty input encodes to an empty stream, and an empty stream decodes to
//! empty output.
//!
//! # Matching
//!
//! The longest prefix of the lookahead found in the search window is
//! located with a KMP prefix-function scan; among equal-length matches
//! the rightmost (closest to the cursor) wins.

use super::CodecError;

/// Lookahead window size; also the maximum match length (fits `u8`... the
/// token field is one byte, so 255 is a hard ceiling).
pub const FRONT_SIZE: usize = 255;

/// Search window size; the maximum back reference distance (fits `u16`).
pub const BACK_SIZE: usize = 65535;

const TOKEN_SIZE: usize = 4;

// ── Matching ─────────────────────────────────────────────────────────────────

fn prefix_function(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; pattern.len()];
    for i in 1..pattern.len() {
        let mut j = table[i - 1];
        while j > 0 && pattern[i] != pattern[j] {
            j = table[j - 1];
        }
        if pattern[i] == pattern[j] {
            j += 1;
        }
        table[i] = j;
    }
    table
}

/// Longest prefix of `lookahead` occurring in `search`.
///
/// Returns `(back_position, match_length, next_char)` where
/// `back_position` counts from the end of `search` to the match start and
/// `next_char` is the lookahead byte after the match — or `tail` when the
/// whole lookahead matched.  Later matches of equal length win.
fn longest_match(search: &[u8], lookahead: &[u8], tail: u8) -> (usize, usize, u8) {
    debug_assert!(!lookahead.is_empty());
    let mut best = (0usize, 0usize, lookahead[0]);
    let prefix = prefix_function(lookahead);
    let mut j = 0usize;
    for i in 0..search.len() {
        // One full automaton step: a complete match first drops to its
        // longest border, then the failure-function walk continues until
        // the state actually matches `search[i]` or empties.
        if j == lookahead.len() {
            j = prefix[j - 1];
        }
        while j > 0 && search[i] != lookahead[j] {
            j = prefix[j - 1];
        }
        if lookahead[j] == search[i] {
            j += 1;
        }
        if j >= best.1 {
            let next = if j < lookahead.len() { lookahead[j] } else { tail };
            best = (search.len() - i + j - 1, j, next);
        }
    }
    best
}

// ── Encode ───────────────────────────────────────────────────────────────────

pub fn compress(input: &[u8]) -> Vec<u8> {
    if input.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut terminate = true;
    while cursor < input.len() {
        let search = &input[cursor.saturating_sub(BACK_SIZE)..cursor];
        let lookahead = &input[cursor..(cursor + FRONT_SIZE).min(input.len())];
        let (position, length, _) = longest_match(search, lookahead, 0);
        if cursor + length < input.len() {
            // The byte after the match; for a full-window match this is the
            // first byte past the lookahead.
            emit(&mut out, position as u16, length as u8, input[cursor + length]);
            cursor += length + 1;
        } else {
            // Match runs to the end of input: the token's next_char slot
            // holds the stream sentinel, no terminator follows.
            emit(&mut out, position as u16, length as u8, 0);
            cursor = input.len();
            terminate = false;
        }
    }
    if terminate {
        emit(&mut out, 0, 0, 0);
    }
    out
}

fn emit(out: &mut Vec<u8>, position: u16, length: u8, next: u8) {
    out.extend_from_slice(&position.to_be_bytes());
    out.push(length);
    out.push(next);
}

// ── Decode ───────────────────────────────────────────────────────────────────

pub fn decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if input.len() % TOKEN_SIZE != 0 {
        return Err(CodecError::Malformed("LZ77 stream is not whole tokens"));
    }
    let mut out = Vec::new();
    for token in input.chunks_exact(TOKEN_SIZE) {
        let position = u16::from_be_bytes([token[0], token[1]]) as usize;
        let length = token[2] as usize;
        if position > out.len() || (position == 0 && length > 0) {
            return Err(CodecError::Malformed("LZ77 back reference out of range"));
        }
        let start = out.len() - position;
        // Byte-by-byte so a reference overlapping the end extends the run.
        for k in 0..length {
            let byte = out[start + k];
            out.push(byte);
        }
        out.push(token[3]);
    }
    out.pop();
    Ok(out)
}
