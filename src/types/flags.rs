//! Flag sets carried by operations and chunks.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Mode flags of an operation. They stay fixed for the whole logical stream.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JobFlags: u32 {
        /// Symbols are coded with a caller-supplied table and no block header.
        const CANNED_MODE = 1 << 0;
        /// No DEFLATE block headers. Together with `GEN_LITERALS` this is Huffman-only mode.
        const NO_HEADERS = 1 << 1;
        /// Literal-only coding, no LZ77 matches.
        const GEN_LITERALS = 1 << 2;
        /// Build Huffman codes from the data being compressed.
        const DYNAMIC_HUFFMAN = 1 << 3;
        /// Big-endian 16-bit packing for Huffman-only streams.
        const HUFFMAN_BE = 1 << 4;
        /// Skip the decode-back verification of compressed output.
        const OMIT_VERIFY = 1 << 5;
        /// Wrap the DEFLATE stream in a zlib header and Adler-32 trailer.
        const ZLIB_MODE = 1 << 6;
        /// Decode a block range that does not end with a final block.
        const RANDOM_ACCESS = 1 << 7;
        /// Decompress before an analytics operation. Not valid for compress/decompress jobs.
        const DECOMPRESS_ENABLE = 1 << 8;

        const HUFFMAN_ONLY = Self::NO_HEADERS.bits() | Self::GEN_LITERALS.bits();
    }
}

bitflags! {
    /// Position of a chunk within its logical stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChunkFlags: u8 {
        const FIRST = 1 << 0;
        const LAST = 1 << 1;
        const SINGLE = Self::FIRST.bits() | Self::LAST.bits();
    }
}

impl JobFlags {
    pub fn is_huffman_only(&self) -> bool {
        self.contains(JobFlags::HUFFMAN_ONLY)
    }
}
