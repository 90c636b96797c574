//! Canonical Huffman codes: length-limited construction, code assignment and a
//! bit-serial decoder.
//!
//! The decoder consumes one bit at a time through `BitSource`, which makes it
//! indifferent to the packing (LSB-first bytes or BE16 words) and lets the caller
//! stop at any bit boundary and resume later.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::DataError;
use crate::kernels::bitstream::{BitSource, CodeSink};

/// Longest literal/length or distance code DEFLATE allows.
pub const MAX_CODE_BITS: u8 = 15;
/// Longest code-length code.
pub const MAX_CODE_LENGTH_BITS: u8 = 7;

//==================================================================================
// 1. Code Construction
//==================================================================================

fn tree_depths(freqs: &[u64]) -> Vec<u8> {
    let n = freqs.len();
    let mut lengths = vec![0u8; n];
    let used: Vec<usize> = (0..n).filter(|&i| freqs[i] > 0).collect();
    match used.len() {
        0 => return lengths,
        1 => {
            lengths[used[0]] = 1;
            return lengths;
        }
        _ => {}
    }

    // Leaves are 0..n, internal nodes are appended. Ties break on node index so the
    // construction is deterministic.
    let mut parent: Vec<usize> = vec![usize::MAX; n];
    let mut heap = BinaryHeap::new();
    for &sym in &used {
        heap.push(Reverse((freqs[sym], sym)));
    }
    while heap.len() > 1 {
        let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let node = parent.len();
        parent.push(usize::MAX);
        parent[a] = node;
        parent[b] = node;
        heap.push(Reverse((wa + wb, node)));
    }

    for &sym in &used {
        let mut depth = 0u32;
        let mut cur = sym;
        while parent[cur] != usize::MAX {
            cur = parent[cur];
            depth += 1;
        }
        lengths[sym] = depth.min(u8::MAX as u32) as u8;
    }
    lengths
}

/// Builds code lengths no longer than `max_bits` for the given frequencies.
///
/// Symbols with a zero frequency get no code. A lone used symbol gets a 1-bit code.
/// When the unconstrained tree is too deep, the frequencies are flattened and the
/// tree rebuilt until it fits.
pub fn build_code_lengths(freqs: &[u32], max_bits: u8) -> Vec<u8> {
    let mut scaled: Vec<u64> = freqs.iter().map(|&f| f as u64).collect();
    loop {
        let lengths = tree_depths(&scaled);
        if lengths.iter().all(|&l| l <= max_bits) {
            return lengths;
        }
        for f in scaled.iter_mut().filter(|f| **f > 0) {
            *f = (*f >> 1).max(1);
        }
    }
}

/// Assigns canonical codes (MSB-first) to a set of code lengths.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u16; 16];
    for &l in lengths {
        if l > 0 {
            bl_count[l as usize] += 1;
        }
    }
    let mut next_code = [0u16; 16];
    let mut code = 0u16;
    for bits in 1..16 {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    lengths
        .iter()
        .map(|&l| {
            if l == 0 {
                0
            } else {
                let c = next_code[l as usize];
                next_code[l as usize] += 1;
                c
            }
        })
        .collect()
}

//==================================================================================
// 2. CodeBook
//==================================================================================

/// A code length per symbol plus the derived canonical codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBook {
    lengths: Vec<u8>,
    codes: Vec<u16>,
}

impl CodeBook {
    pub fn from_lengths(lengths: Vec<u8>) -> Self {
        let codes = canonical_codes(&lengths);
        Self { lengths, codes }
    }

    pub fn from_frequencies(freqs: &[u32], max_bits: u8) -> Self {
        Self::from_lengths(build_code_lengths(freqs, max_bits))
    }

    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.iter().all(|&l| l == 0)
    }

    pub fn has_code(&self, symbol: usize) -> bool {
        self.lengths.get(symbol).is_some_and(|&l| l > 0)
    }

    /// Writes the code of `symbol`. The caller guarantees `has_code(symbol)`.
    #[inline]
    pub fn put<S: CodeSink>(&self, sink: &mut S, symbol: usize) {
        debug_assert!(self.has_code(symbol), "symbol {} has no code", symbol);
        sink.put_code(self.codes[symbol], self.lengths[symbol]);
    }

    /// Bits needed to code the given symbol counts. Counts of uncoded symbols are ignored.
    pub fn cost(&self, counts: &[u32]) -> u64 {
        counts
            .iter()
            .zip(&self.lengths)
            .map(|(&c, &l)| c as u64 * l as u64)
            .sum()
    }

    pub fn decoder(&self) -> Result<HuffmanDecoder, DataError> {
        HuffmanDecoder::from_lengths(&self.lengths)
    }
}

//==================================================================================
// 3. Decoder
//==================================================================================

/// Canonical decoder walking the code one bit at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanDecoder {
    counts: [u16; 16],
    symbols: Vec<u16>,
}

impl HuffmanDecoder {
    /// Builds a decoder. Incomplete codes are accepted; over-subscribed ones are not.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self, DataError> {
        let mut counts = [0u16; 16];
        for &l in lengths {
            if l as usize >= counts.len() {
                return Err(DataError::InvalidCodeLengths("code longer than 15 bits"));
            }
            counts[l as usize] += 1;
        }
        counts[0] = 0;

        let mut left: i32 = 1;
        for &count in counts.iter().skip(1) {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(DataError::InvalidCodeLengths("over-subscribed code"));
            }
        }

        let mut offsets = [0u16; 16];
        for len in 1..15 {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let mut symbols = vec![0u16; lengths.len()];
        for (sym, &l) in lengths.iter().enumerate() {
            if l > 0 {
                symbols[offsets[l as usize] as usize] = sym as u16;
                offsets[l as usize] += 1;
            }
        }
        Ok(Self { counts, symbols })
    }

    /// Decodes one symbol.
    ///
    /// Returns `Ok(None)` when the source runs dry mid-code; the source position is
    /// then restored so the caller can retry after more input arrives.
    pub fn decode<S: BitSource>(&self, src: &mut S) -> Result<Option<u16>, DataError> {
        let start = src.position();
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..16 {
            let Some(bit) = src.next_bit() else {
                src.set_position(start);
                return Ok(None);
            };
            code |= bit as i32;
            let count = self.counts[len] as i32;
            if code - count < first {
                return Ok(Some(self.symbols[(index + (code - first)) as usize]));
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err(DataError::InvalidSymbol)
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::bitstream::{Be16Reader, Be16Writer, BitWriter, LsbReader};

    #[test]
    fn test_single_symbol_gets_one_bit() {
        let mut freqs = vec![0u32; 256];
        freqs[b'a' as usize] = 1000;
        let lengths = build_code_lengths(&freqs, MAX_CODE_BITS);
        assert_eq!(lengths[b'a' as usize], 1);
        assert_eq!(lengths.iter().filter(|&&l| l > 0).count(), 1);
    }

    #[test]
    fn test_lengths_respect_limit_for_skewed_input() {
        // Fibonacci weights produce a maximally deep tree.
        let mut freqs = vec![0u32; 30];
        let (mut a, mut b) = (1u32, 1u32);
        for f in freqs.iter_mut() {
            *f = a;
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        let lengths = build_code_lengths(&freqs, MAX_CODE_BITS);
        assert!(lengths.iter().all(|&l| l >= 1 && l <= MAX_CODE_BITS));
        // Kraft inequality
        let kraft: f64 = lengths.iter().map(|&l| 2f64.powi(-(l as i32))).sum();
        assert!(kraft <= 1.0 + 1e-9);
    }

    #[test]
    fn test_canonical_codes_match_rfc_example() {
        // RFC 1951 section 3.2.2 example: lengths (3, 3, 3, 3, 3, 2, 4, 4).
        let codes = canonical_codes(&[3, 3, 3, 3, 3, 2, 4, 4]);
        assert_eq!(codes, vec![0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);
    }

    #[test]
    fn test_decoder_reads_lsb_and_be16_packings() {
        let freqs: Vec<u32> = (1..=20).collect();
        let book = CodeBook::from_frequencies(&freqs, MAX_CODE_BITS);
        let decoder = book.decoder().unwrap();
        let message: Vec<usize> = vec![0, 19, 7, 7, 3, 12, 19, 0];

        let mut lsb = BitWriter::new();
        let mut be = Be16Writer::new();
        for &s in &message {
            book.put(&mut lsb, s);
            book.put(&mut be, s);
        }
        let bits = lsb.bits_written() as usize;
        let (lsb_bytes, _) = lsb.finish();
        let (be_bytes, _) = be.finish();

        let mut r = LsbReader::new(&lsb_bytes, 0, bits);
        let mut r_be = Be16Reader::new(&be_bytes, 0, bits);
        for &s in &message {
            assert_eq!(decoder.decode(&mut r).unwrap(), Some(s as u16));
            assert_eq!(decoder.decode(&mut r_be).unwrap(), Some(s as u16));
        }
        assert_eq!(decoder.decode(&mut r).unwrap(), None);
    }

    #[test]
    fn test_decoder_restores_position_on_partial_code() {
        let book = CodeBook::from_lengths(vec![1, 2, 3, 3]);
        let decoder = book.decoder().unwrap();
        let mut w = BitWriter::new();
        book.put(&mut w, 3);
        let (bytes, _) = w.finish();
        let mut r = LsbReader::new(&bytes, 0, 2);
        assert_eq!(decoder.decode(&mut r).unwrap(), None);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_over_subscribed_lengths_rejected() {
        assert!(HuffmanDecoder::from_lengths(&[1, 1, 1]).is_err());
    }
}
