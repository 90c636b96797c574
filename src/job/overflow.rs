//! Stored-block accounting and the fallback decision.
//!
//! Fixed, static and dynamic streams are cut into segments of at most
//! `MAX_STORED_BLOCK_SIZE` bytes. Each segment is written either Huffman coded or as a
//! stored block, whichever takes fewer bits, so no segment ever costs more than its
//! stored form. The whole stream therefore fits in `worst_case_compressed_size`.
//! Canned and Huffman-only streams have no block framing and never fall back.

use crate::bridge::format::{MAX_STORED_BLOCK_SIZE, STORED_BLOCK_HEADER_SIZE};

/// Stored blocks needed to carry `len` bytes. An empty stream still needs one block.
pub fn stored_block_count(len: usize) -> usize {
    len.div_ceil(MAX_STORED_BLOCK_SIZE).max(1)
}

/// Largest DEFLATE body the encoder produces for `len` input bytes.
pub fn worst_case_compressed_size(len: usize) -> usize {
    len + STORED_BLOCK_HEADER_SIZE * stored_block_count(len)
}

/// True when a segment should be written as a stored block. Ties go to stored.
pub fn prefer_stored(stored_bits: u64, huffman_bits: u64) -> bool {
    stored_bits <= huffman_bits
}
