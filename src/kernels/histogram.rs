//! Symbol statistics used to build Huffman tables.

use crate::kernels::deflate::{length_symbol, distance_symbol, NUM_DISTANCE_SYMBOLS, NUM_LITLEN_SYMBOLS};
use crate::kernels::lz77::{MatchEffort, MatchFinder, Token};

/// Literal/length and distance symbol counts.
///
/// The end-of-block symbol is never counted; code builders reserve it themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub literal_lengths: [u32; NUM_LITLEN_SYMBOLS],
    pub distances: [u32; NUM_DISTANCE_SYMBOLS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            literal_lengths: [0; NUM_LITLEN_SYMBOLS],
            distances: [0; NUM_DISTANCE_SYMBOLS],
        }
    }

    #[inline]
    pub fn add_token(&mut self, token: &Token) {
        match *token {
            Token::Literal(b) => self.literal_lengths[b as usize] += 1,
            Token::Match { length, distance } => {
                self.literal_lengths[length_symbol(length).0] += 1;
                self.distances[distance_symbol(distance).0] += 1;
            }
        }
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        let mut histogram = Self::new();
        for t in tokens {
            histogram.add_token(t);
        }
        histogram
    }

    /// Byte counts only, for Huffman-only coding.
    pub fn from_literals(data: &[u8]) -> Self {
        let mut histogram = Self::new();
        for &b in data {
            histogram.literal_lengths[b as usize] += 1;
        }
        histogram
    }

    /// Counts the tokens the match finder produces for `data`.
    pub fn from_matches(data: &[u8], effort: MatchEffort) -> Self {
        let mut finder = MatchFinder::new(effort);
        let mut histogram = Self::new();
        let mut tokens = Vec::new();
        for chunk in data.chunks(u16::MAX as usize) {
            tokens.clear();
            finder.tokenize(chunk, &mut tokens);
            for t in &tokens {
                histogram.add_token(t);
            }
        }
        histogram
    }

    pub fn merge(&mut self, other: &Histogram) {
        for (a, b) in self.literal_lengths.iter_mut().zip(other.literal_lengths.iter()) {
            *a += b;
        }
        for (a, b) in self.distances.iter_mut().zip(other.distances.iter()) {
            *a += b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literal_lengths.iter().all(|&c| c == 0) && self.distances.iter().all(|&c| c == 0)
    }

    /// Literal counts as a 256-entry slice.
    pub fn literals(&self) -> &[u32] {
        &self.literal_lengths[..256]
    }
}
