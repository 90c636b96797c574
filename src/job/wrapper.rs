//! zlib framing (RFC 1950) around a DEFLATE body.

use crate::bridge::format::{
    ZLIB_CMF, ZLIB_CM_DEFLATE, ZLIB_DICT_ID_SIZE, ZLIB_FDICT, ZLIB_FLEVEL_MAX, ZLIB_HEADER_SIZE,
    ZLIB_TRAILER_SIZE,
};
use crate::error::DataError;

/// A parsed zlib header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibHeader {
    pub dictionary_id: Option<u32>,
}

impl ZlibHeader {
    /// Bytes the header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        ZLIB_HEADER_SIZE + self.dictionary_id.map_or(0, |_| ZLIB_DICT_ID_SIZE)
    }
}

/// Writes CMF/FLG (with a check value making the pair a multiple of 31) and the
/// optional dictionary id.
pub fn write_header(out: &mut Vec<u8>, dictionary_id: Option<u32>) {
    let mut flg = ZLIB_FLEVEL_MAX;
    if dictionary_id.is_some() {
        flg |= ZLIB_FDICT;
    }
    let check = ((ZLIB_CMF as u16) << 8) | flg as u16;
    flg |= (31 - check % 31) as u8 % 31;
    out.push(ZLIB_CMF);
    out.push(flg);
    if let Some(id) = dictionary_id {
        out.extend_from_slice(&id.to_be_bytes());
    }
}

/// Parses a header from the start of `bytes`. `Ok(None)` means more bytes are needed.
pub fn read_header(bytes: &[u8]) -> Result<Option<ZlibHeader>, DataError> {
    if bytes.len() < ZLIB_HEADER_SIZE {
        return Ok(None);
    }
    let (cmf, flg) = (bytes[0], bytes[1]);
    if cmf & 0x0F != ZLIB_CM_DEFLATE {
        return Err(DataError::BadZlibHeader("compression method is not deflate"));
    }
    if cmf >> 4 > 7 {
        return Err(DataError::BadZlibHeader("window size above 32 KiB"));
    }
    if (((cmf as u16) << 8) | flg as u16) % 31 != 0 {
        return Err(DataError::BadZlibHeader("header check bits do not match"));
    }
    if flg & ZLIB_FDICT == 0 {
        return Ok(Some(ZlibHeader { dictionary_id: None }));
    }
    let end = ZLIB_HEADER_SIZE + ZLIB_DICT_ID_SIZE;
    if bytes.len() < end {
        return Ok(None);
    }
    let mut id = [0u8; 4];
    id.copy_from_slice(&bytes[ZLIB_HEADER_SIZE..end]);
    Ok(Some(ZlibHeader {
        dictionary_id: Some(u32::from_be_bytes(id)),
    }))
}

pub fn write_trailer(out: &mut Vec<u8>, adler: u32) {
    out.extend_from_slice(&adler.to_be_bytes());
}

/// Checks the big-endian Adler-32 trailer against the computed value.
pub fn check_trailer(trailer: &[u8], computed: u32) -> Result<(), DataError> {
    if trailer.len() < ZLIB_TRAILER_SIZE {
        return Err(DataError::TruncatedStream);
    }
    let mut word = [0u8; 4];
    word.copy_from_slice(&trailer[..ZLIB_TRAILER_SIZE]);
    let expected = u32::from_be_bytes(word);
    if expected != computed {
        return Err(DataError::ChecksumMismatch {
            expected,
            actual: computed,
        });
    }
    Ok(())
}
