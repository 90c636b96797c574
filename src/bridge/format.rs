// In: src/bridge/format.rs

//! Defines all byte-level structures and constants of the formats this library
//! reads and writes: stored DEFLATE blocks, the zlib wrapper and the flat dictionary
//! blob. This is the single source of truth for their sizes and magic values.

//==================================================================================
// I. Stored Blocks
//==================================================================================

/// BFINAL/BTYPE bits padded to a byte, then LEN and NLEN, for an aligned stored block.
pub const STORED_BLOCK_HEADER_SIZE: usize = 5;
/// Largest payload of one stored block.
pub const MAX_STORED_BLOCK_SIZE: usize = 65_535;

//==================================================================================
// II. zlib Wrapper
//==================================================================================

/// CMF byte: deflate (CM = 8) with a 32 KiB window (CINFO = 7).
pub const ZLIB_CMF: u8 = 0x78;
/// Compression method field value for deflate.
pub const ZLIB_CM_DEFLATE: u8 = 8;
/// FLG bit announcing a preset dictionary id after the header.
pub const ZLIB_FDICT: u8 = 0x20;
/// FLEVEL value written by this library (maximum compression).
pub const ZLIB_FLEVEL_MAX: u8 = 0xC0;
pub const ZLIB_HEADER_SIZE: usize = 2;
pub const ZLIB_DICT_ID_SIZE: usize = 4;
pub const ZLIB_TRAILER_SIZE: usize = 4;

//==================================================================================
// III. Dictionary Blob
//==================================================================================

/// The magic number at the start of a built dictionary.
pub const DICTIONARY_MAGIC: &[u8; 4] = b"CDDC";
/// The current version of the dictionary layout.
pub const DICTIONARY_FORMAT_VERSION: u8 = 1;
/// Marker for an unset level in the dictionary header.
pub const DICTIONARY_LEVEL_NONE: u8 = 0xFF;

/// magic(4) | version(1) | sw level(1) | hw level(1) | reserved(1) |
/// history length(4, LE) | dictionary id(4, LE), followed by the history bytes.
pub const DICTIONARY_HEADER_SIZE: usize = 16;
