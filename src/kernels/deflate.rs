//! DEFLATE block encoding: symbol tables, fixed and dynamic code sets, stored blocks
//! and dynamic block headers.

use std::sync::{Arc, OnceLock};

use crate::kernels::bitstream::{BitWriter, CodeSink};
use crate::kernels::histogram::Histogram;
use crate::kernels::huffman::{CodeBook, HuffmanDecoder, MAX_CODE_BITS, MAX_CODE_LENGTH_BITS};
use crate::kernels::lz77::Token;
use crate::error::DataError;

//==================================================================================
// 0. Constants
//==================================================================================

pub const END_OF_BLOCK: usize = 256;
/// Literal/length symbols 0..=285.
pub const NUM_LITLEN_SYMBOLS: usize = 286;
pub const NUM_DISTANCE_SYMBOLS: usize = 30;

pub const BTYPE_STORED: u32 = 0;
pub const BTYPE_FIXED: u32 = 1;
pub const BTYPE_DYNAMIC: u32 = 2;

pub const LEN_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
pub const LEN_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
pub const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
pub const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of the code-length code lengths.
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

//==================================================================================
// 1. Symbol Mapping
//==================================================================================

/// Maps a match length (3..=258) to (symbol, extra value, extra bit count).
#[inline]
pub fn length_symbol(length: u16) -> (usize, u32, u32) {
    let idx = match LEN_BASE.iter().rposition(|&base| base <= length) {
        Some(i) => i,
        None => 0,
    };
    (
        257 + idx,
        (length - LEN_BASE[idx]) as u32,
        LEN_EXTRA[idx] as u32,
    )
}

/// Maps a distance (1..=32768) to (symbol, extra value, extra bit count).
#[inline]
pub fn distance_symbol(distance: u16) -> (usize, u32, u32) {
    let idx = match DIST_BASE.iter().rposition(|&base| base <= distance) {
        Some(i) => i,
        None => 0,
    };
    (
        idx,
        (distance - DIST_BASE[idx]) as u32,
        DIST_EXTRA[idx] as u32,
    )
}

//==================================================================================
// 2. Code Sets
//==================================================================================

/// The literal/length and distance codes of one block (or one canned table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeflateCodes {
    pub litlen: CodeBook,
    pub distance: CodeBook,
}

/// Decoders matching a `DeflateCodes`.
#[derive(Debug, Clone)]
pub struct DeflateDecoders {
    pub litlen: HuffmanDecoder,
    pub distance: HuffmanDecoder,
}

impl DeflateCodes {
    /// The fixed codes of RFC 1951 section 3.2.6.
    pub fn fixed() -> Arc<DeflateCodes> {
        static FIXED: OnceLock<Arc<DeflateCodes>> = OnceLock::new();
        FIXED
            .get_or_init(|| {
                let mut litlen = vec![0u8; 288];
                litlen[..144].fill(8);
                litlen[144..256].fill(9);
                litlen[256..280].fill(7);
                litlen[280..].fill(8);
                Arc::new(DeflateCodes {
                    litlen: CodeBook::from_lengths(litlen),
                    distance: CodeBook::from_lengths(vec![5u8; 30]),
                })
            })
            .clone()
    }

    /// Codes built from the symbol counts of a block. EOB always gets a code, and at
    /// least one distance code exists so the header stays well formed.
    pub fn for_counts(histogram: &Histogram) -> Self {
        let mut litlen_freqs = histogram.literal_lengths.to_vec();
        litlen_freqs[END_OF_BLOCK] = litlen_freqs[END_OF_BLOCK].max(1);
        let mut distance_lengths =
            CodeBook::from_frequencies(&histogram.distances, MAX_CODE_BITS).lengths().to_vec();
        if distance_lengths.iter().all(|&l| l == 0) {
            distance_lengths[0] = 1;
        }
        Self {
            litlen: CodeBook::from_frequencies(&litlen_freqs, MAX_CODE_BITS),
            distance: CodeBook::from_lengths(distance_lengths),
        }
    }

    /// Codes in which every symbol is encodable: zero counts are raised to one.
    pub fn complete_for_counts(histogram: &Histogram) -> Self {
        let litlen: Vec<u32> = histogram.literal_lengths.iter().map(|&c| c.max(1)).collect();
        let distance: Vec<u32> = histogram.distances.iter().map(|&c| c.max(1)).collect();
        Self {
            litlen: CodeBook::from_frequencies(&litlen, MAX_CODE_BITS),
            distance: CodeBook::from_frequencies(&distance, MAX_CODE_BITS),
        }
    }

    pub fn decoders(&self) -> Result<DeflateDecoders, DataError> {
        Ok(DeflateDecoders {
            litlen: self.litlen.decoder()?,
            distance: self.distance.decoder()?,
        })
    }

    /// True when every symbol the tokens need has a code.
    pub fn can_encode(&self, histogram: &Histogram) -> bool {
        let litlen_ok = histogram
            .literal_lengths
            .iter()
            .enumerate()
            .all(|(s, &c)| c == 0 || self.litlen.has_code(s));
        let distance_ok = histogram
            .distances
            .iter()
            .enumerate()
            .all(|(s, &c)| c == 0 || self.distance.has_code(s));
        litlen_ok && distance_ok
    }

    /// Bits taken by the coded tokens, excluding EOB and any header.
    pub fn data_cost(&self, histogram: &Histogram) -> u64 {
        let mut bits =
            self.litlen.cost(&histogram.literal_lengths) + self.distance.cost(&histogram.distances);
        for (i, &count) in histogram.literal_lengths[257..].iter().enumerate() {
            bits += count as u64 * LEN_EXTRA[i] as u64;
        }
        for (i, &count) in histogram.distances.iter().enumerate() {
            bits += count as u64 * DIST_EXTRA[i] as u64;
        }
        bits
    }

    pub fn eob_cost(&self) -> u64 {
        self.litlen.lengths()[END_OF_BLOCK] as u64
    }

    /// Writes the tokens. The caller guarantees `can_encode`.
    pub fn encode_tokens(&self, w: &mut BitWriter, tokens: &[Token]) {
        for token in tokens {
            match *token {
                Token::Literal(b) => self.litlen.put(w, b as usize),
                Token::Match { length, distance } => {
                    let (sym, extra, nbits) = length_symbol(length);
                    self.litlen.put(w, sym);
                    w.write_bits(extra, nbits);
                    let (dsym, dextra, dbits) = distance_symbol(distance);
                    self.distance.put(w, dsym);
                    w.write_bits(dextra, dbits);
                }
            }
        }
    }

    pub fn encode_end_of_block<S: CodeSink>(&self, sink: &mut S) {
        self.litlen.put(sink, END_OF_BLOCK);
    }
}

//==================================================================================
// 3. Block Writers
//==================================================================================

pub fn write_block_header(w: &mut BitWriter, final_block: bool, btype: u32) {
    w.write_bits(final_block as u32, 1);
    w.write_bits(btype, 2);
}

/// Writes one stored block. `data` must not exceed 65 535 bytes.
pub fn write_stored_block(w: &mut BitWriter, data: &[u8], final_block: bool) {
    debug_assert!(data.len() <= u16::MAX as usize);
    write_block_header(w, final_block, BTYPE_STORED);
    w.align_to_byte();
    let len = data.len() as u16;
    w.write_bits(len as u32, 16);
    w.write_bits(!len as u32, 16);
    w.write_aligned_bytes(data);
}

/// Bits a stored block of `len` bytes takes when started with `pending` bits
/// already in the current byte.
pub fn stored_block_bits(pending: u32, len: usize) -> u64 {
    let after_header = (pending + 3) % 8;
    let pad = if after_header == 0 { 0 } else { 8 - after_header };
    3 + pad as u64 + 32 + 8 * len as u64
}

/// One code-length symbol of the run-length coded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LengthSymbol {
    symbol: u8,
    extra: u8,
}

/// Run-length codes the concatenated code lengths with symbols 16, 17 and 18.
fn run_length_code(lengths: &[u8]) -> Vec<LengthSymbol> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == value {
            run += 1;
        }
        let mut remaining = run;
        if value == 0 {
            while remaining >= 11 {
                let n = remaining.min(138);
                out.push(LengthSymbol { symbol: 18, extra: (n - 11) as u8 });
                remaining -= n;
            }
            if remaining >= 3 {
                out.push(LengthSymbol { symbol: 17, extra: (remaining - 3) as u8 });
                remaining = 0;
            }
        } else {
            out.push(LengthSymbol { symbol: value, extra: 0 });
            remaining -= 1;
            while remaining >= 3 {
                let n = remaining.min(6);
                out.push(LengthSymbol { symbol: 16, extra: (n - 3) as u8 });
                remaining -= n;
            }
        }
        for _ in 0..remaining {
            out.push(LengthSymbol { symbol: value, extra: 0 });
        }
        i += run;
    }
    out
}

fn extra_bits_of(symbol: u8) -> u32 {
    match symbol {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Writes the header of a dynamic block (after BFINAL/BTYPE) describing `codes`.
pub fn write_dynamic_header(w: &mut BitWriter, codes: &DeflateCodes) {
    let litlen = codes.litlen.lengths();
    let distance = codes.distance.lengths();
    let hlit = (litlen.iter().rposition(|&l| l > 0).map_or(0, |p| p + 1)).max(257);
    let hdist = (distance.iter().rposition(|&l| l > 0).map_or(0, |p| p + 1)).max(1);

    let mut all = Vec::with_capacity(hlit + hdist);
    all.extend_from_slice(&litlen[..hlit]);
    all.extend((0..hdist).map(|i| distance.get(i).copied().unwrap_or(0)));
    let rle = run_length_code(&all);

    let mut clen_freqs = [0u32; 19];
    for s in &rle {
        clen_freqs[s.symbol as usize] += 1;
    }
    let clen_book = CodeBook::from_frequencies(&clen_freqs, MAX_CODE_LENGTH_BITS);
    let hclen = CODE_LENGTH_ORDER
        .iter()
        .rposition(|&s| clen_book.lengths()[s] > 0)
        .map_or(0, |p| p + 1)
        .max(4);

    w.write_bits((hlit - 257) as u32, 5);
    w.write_bits((hdist - 1) as u32, 5);
    w.write_bits((hclen - 4) as u32, 4);
    for &s in &CODE_LENGTH_ORDER[..hclen] {
        w.write_bits(clen_book.lengths()[s] as u32, 3);
    }
    for s in &rle {
        clen_book.put(w, s.symbol as usize);
        w.write_bits(s.extra as u32, extra_bits_of(s.symbol));
    }
}

/// Bits of the dynamic header for `codes`, including BFINAL/BTYPE.
pub fn dynamic_header_bits(codes: &DeflateCodes) -> u64 {
    let mut scratch = BitWriter::new();
    write_block_header(&mut scratch, false, BTYPE_DYNAMIC);
    write_dynamic_header(&mut scratch, codes);
    scratch.bits_written()
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_symbol_boundaries() {
        assert_eq!(length_symbol(3), (257, 0, 0));
        assert_eq!(length_symbol(10), (264, 0, 0));
        assert_eq!(length_symbol(12), (265, 1, 1));
        assert_eq!(length_symbol(257), (284, 30, 5));
        assert_eq!(length_symbol(258), (285, 0, 0));
    }

    #[test]
    fn test_distance_symbol_boundaries() {
        assert_eq!(distance_symbol(1), (0, 0, 0));
        assert_eq!(distance_symbol(5), (4, 0, 1));
        assert_eq!(distance_symbol(32768), (29, 8191, 13));
    }

    #[test]
    fn test_stored_block_layout() {
        let mut w = BitWriter::new();
        write_stored_block(&mut w, b"abc", true);
        let (bytes, valid) = w.finish();
        assert_eq!(bytes, vec![0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c']);
        assert_eq!(valid, 0);
        assert_eq!(stored_block_bits(0, 3), 8 * 8);
        assert_eq!(stored_block_bits(5, 3), 3 + 32 + 24);
    }

    #[test]
    fn test_run_length_code_uses_repeat_symbols() {
        let mut lengths = vec![8u8; 10];
        lengths.extend(vec![0u8; 20]);
        lengths.extend(vec![0u8, 0]);
        let rle = run_length_code(&lengths);
        // 8, repeat 6, repeat 3, then a single 18 for 22 zeros.
        assert_eq!(rle[0], LengthSymbol { symbol: 8, extra: 0 });
        assert_eq!(rle[1], LengthSymbol { symbol: 16, extra: 3 });
        assert_eq!(rle[2], LengthSymbol { symbol: 16, extra: 0 });
        assert_eq!(rle[3], LengthSymbol { symbol: 18, extra: 11 });
        assert_eq!(rle.len(), 4);
    }

    #[test]
    fn test_complete_codes_cover_every_symbol() {
        let mut histogram = Histogram::new();
        histogram.literal_lengths[b'e' as usize] = 5000;
        let codes = DeflateCodes::complete_for_counts(&histogram);
        assert!((0..NUM_LITLEN_SYMBOLS).all(|s| codes.litlen.has_code(s)));
        assert!((0..NUM_DISTANCE_SYMBOLS).all(|s| codes.distance.has_code(s)));
        assert!(codes.litlen.lengths()[b'e' as usize] < codes.litlen.lengths()[b'z' as usize]);
    }
}
