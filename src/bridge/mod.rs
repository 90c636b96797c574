// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the convenience boundary of the library. The job layer exposes the
// full chunk protocol; the bridge wraps it for callers that hold a whole buffer:
//
//   1. [Stateless API (compress_buffer / decompress_buffer)] -> Receives `&[u8]`
//         |
//         `-> a. Creates a `Job` on the requested execution path
//         |
//         `-> b. Runs one FIRST|LAST chunk, retrying on `MoreOutputNeeded`
//
//   2. [Job Layer (job::Job)]               -> Returns the output bytes, the
//                                              `last_bit_offset` and the CRC-32
//
// The byte-level constants of every format the library writes live in `format`.
//
// ====================================================================================
pub(crate) mod format;
pub mod stateless_api;

pub use stateless_api::{
    compress_buffer, compress_buffer_with, decompress_buffer, decompress_buffer_with,
    CompressOptions, Compressed, DecompressOptions,
};
