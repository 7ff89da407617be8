//! Static Huffman coder.
//!
//! # Encoded layout
//!
//! ```text
//! Offset  Size  Field
//!    0      1   padding_length   zero bits appended to the bit stream
//!    1   2048   frequency_table  256 × u64 big-endian symbol counts
//! 2049    ...   bit_stream       codes packed MSB-first
//! ```
//!
//! The decoder rebuilds the tree from the frequency table alone, so the
//! construction must be fully deterministic: leaves enter a min-heap keyed
//! on (weight, insertion sequence); the two smallest are combined with the
//! first-popped node — the lighter one, or on equal weight the earlier
//! one — as the left child.  Codes read left = 0, right = 1.
//!
//! A non-empty bit stream is padded with `8 - (bit_count % 8)` zero bits,
//! which is a full zero byte when the stream is already byte-aligned.
//! Empty input produces exactly the 2049-byte header and `padding_length`
//! 0.  When only one distinct symbol exists, its leaf is wrapped as the
//! left child of a synthetic root so every code has length ≥ 1.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::CodecError;

/// Frequency table size on disk: 256 × u64.
pub const TABLE_SIZE: usize = 2048;

/// Fixed prefix before the bit stream: padding byte + frequency table.
pub const STREAM_HEADER_SIZE: usize = 1 + TABLE_SIZE;

// ── Tree ─────────────────────────────────────────────────────────────────────

/// Owning tree node; no parent pointers, decode walks with a `&Node`
/// cursor rooted at the owner.
struct Node {
    symbol: Option<u8>,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// Heap entry ordered ascending by (weight, seq) under `BinaryHeap`'s
/// max-heap, so `pop` yields the smallest.
struct HeapEntry {
    weight: u64,
    seq: u32,
    node: Box<Node>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.weight, other.seq).cmp(&(self.weight, self.seq))
    }
}

fn build_tree(freq: &[u64; 256]) -> Option<Box<Node>> {
    let mut heap = BinaryHeap::new();
    let mut seq = 0u32;
    for (symbol, &weight) in freq.iter().enumerate() {
        if weight == 0 {
            continue;
        }
        heap.push(HeapEntry {
            weight,
            seq,
            node: Box::new(Node {
                symbol: Some(symbol as u8),
                left: None,
                right: None,
            }),
        });
        seq += 1;
    }

    while heap.len() > 1 {
        // `left` pops first: it is the lighter node, or on a weight tie the
        // earlier-created one.
        let left = heap.pop().expect("heap has two entries");
        let right = heap.pop().expect("heap has two entries");
        heap.push(HeapEntry {
            weight: left.weight + right.weight,
            seq,
            node: Box::new(Node {
                symbol: None,
                left: Some(left.node),
                right: Some(right.node),
            }),
        });
        seq += 1;
    }

    let root = heap.pop()?.node;
    if root.symbol.is_some() {
        // Single distinct symbol: give it a one-bit code.
        return Some(Box::new(Node {
            symbol: None,
            left: Some(root),
            right: None,
        }));
    }
    Some(root)
}

fn assign_codes(node: &Node, prefix: &mut Vec<u8>, codes: &mut [Vec<u8>; 256]) {
    if let Some(symbol) = node.symbol {
        codes[symbol as usize] = prefix.clone();
        return;
    }
    if let Some(left) = &node.left {
        prefix.push(0);
        assign_codes(left, prefix, codes);
        prefix.pop();
    }
    if let Some(right) = &node.right {
        prefix.push(1);
        assign_codes(right, prefix, codes);
        prefix.pop();
    }
}

fn frequency_table(input: &[u8]) -> Result<[u64; 256], CodecError> {
    let mut freq = [0u64; 256];
    for &byte in input {
        let slot = &mut freq[byte as usize];
        *slot = slot.checked_add(1).ok_or(CodecError::InputTooLarge)?;
    }
    Ok(freq)
}

// ── Encode ───────────────────────────────────────────────────────────────────

pub fn compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let freq = frequency_table(input)?;
    let mut codes: [Vec<u8>; 256] = std::array::from_fn(|_| Vec::new());
    if let Some(root) = build_tree(&freq) {
        assign_codes(&root, &mut Vec::new(), &mut codes);
    }

    let bit_count: u64 = input.iter().map(|&b| codes[b as usize].len() as u64).sum();
    let padding = if bit_count == 0 { 0 } else { 8 - (bit_count % 8) as u8 };

    let mut out =
        Vec::with_capacity(STREAM_HEADER_SIZE + ((bit_count + u64::from(padding)) / 8) as usize);
    out.push(padding);
    for weight in freq {
        out.extend_from_slice(&weight.to_be_bytes());
    }

    let mut acc = 0u8;
    let mut filled = 0u8;
    for &byte in input {
        for &bit in &codes[byte as usize] {
            acc = (acc << 1) | bit;
            filled += 1;
            if filled == 8 {
                out.push(acc);
                acc = 0;
                filled = 0;
            }
        }
    }
    if padding > 0 {
        // Left-align the tail; a full zero byte when already aligned.
        out.push(acc << (padding % 8));
    }
    Ok(out)
}

// ── Decode ───────────────────────────────────────────────────────────────────

pub fn decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    if input.len() < STREAM_HEADER_SIZE {
        return Err(CodecError::Malformed("missing Huffman frequency table"));
    }
    let padding = input[0];
    if padding > 8 {
        return Err(CodecError::Malformed("invalid Huffman padding length"));
    }

    let mut freq = [0u64; 256];
    for (symbol, weight) in freq.iter_mut().enumerate() {
        let offset = 1 + symbol * 8;
        *weight = u64::from_be_bytes(
            input[offset..offset + 8]
                .try_into()
                .expect("table slice is 8 bytes"),
        );
    }

    let stream = &input[STREAM_HEADER_SIZE..];
    let total_bits = stream.len() as u64 * 8;
    if u64::from(padding) > total_bits {
        return Err(CodecError::Malformed("Huffman padding exceeds bit stream"));
    }
    let bit_count = total_bits - u64::from(padding);

    let root = match build_tree(&freq) {
        Some(root) => root,
        None if bit_count == 0 => return Ok(Vec::new()),
        None => return Err(CodecError::Malformed("Huffman bit stream without symbols")),
    };

    let expected_len = freq.iter().fold(0u64, |acc, &w| acc.saturating_add(w));
    let mut out = Vec::with_capacity(expected_len.min(1 << 20) as usize);
    let mut cursor: &Node = &root;
    let mut consumed = 0u64;
    'stream: for &byte in stream {
        for shift in (0..8).rev() {
            if consumed == bit_count {
                break 'stream;
            }
            consumed += 1;
            let child = if byte >> shift & 1 == 0 {
                cursor.left.as_deref()
            } else {
                cursor.right.as_deref()
            };
            cursor = child.ok_or(CodecError::Malformed("invalid Huffman code path"))?;
            if let Some(symbol) = cursor.symbol {
                out.push(symbol);
                cursor = &root;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(input: &[u8]) -> Vec<u8> {
        decompress(&compress(input).expect("compress")).expect("decompress")
    }

    #[test]
    fn empty_input_is_header_only() {
        let encoded = compress(&[]).unwrap();
        assert_eq!(encoded.len(), STREAM_HEADER_SIZE);
        assert_eq!(encoded[0], 0);
        assert_eq!(decompress(&encoded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn single_symbol_run_has_one_bit_codes() {
        let input = vec![b'A'; 1024];
        let encoded = compress(&input).unwrap();
        // 2049-byte header + 128 code bytes + one full padding byte.
        assert_eq!(encoded.len(), 2178);
        assert_eq!(encoded[0], 8);
        assert_eq!(decompress(&encoded).unwrap(), input);
    }

    #[test]
    fn one_byte_input() {
        assert_eq!(round_trip(b"z"), b"z");
    }

    #[test]
    fn all_symbols_round_trip() {
        let input: Vec<u8> = (0u8..=255).collect();
        assert_eq!(round_trip(&input), input);
    }

    #[test]
    fn skewed_distribution_round_trip() {
        let mut input = vec![b'a'; 10_000];
        input.extend(vec![b'b'; 100]);
        input.extend(b"cdefg");
        let encoded = compress(&input).unwrap();
        assert!(encoded.len() < input.len());
        assert_eq!(decompress(&encoded).unwrap(), input);
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let encoded = compress(b"hello world").unwrap();
        assert!(decompress(&encoded[..STREAM_HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn corrupt_padding_is_rejected() {
        let mut encoded = compress(b"hello world").unwrap();
        encoded[0] = 0xFF;
        assert!(decompress(&encoded).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(input in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(round_trip(&input), input);
        }
    }
}
