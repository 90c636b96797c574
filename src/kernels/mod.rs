//! Bit-level codec kernels.
//!
//! These are pure building blocks with no knowledge of jobs, paths or protocols:
//! bit packing, canonical Huffman codes, LZ77 matching, DEFLATE block encoding, a
//! resumable decoder, symbol statistics and checksums. The job layer drives them.

pub mod bitstream;
pub mod checksum;
pub mod deflate;
pub mod histogram;
pub mod huffman;
pub mod inflate;
pub mod lz77;
