//! Bit-level writers and readers.
//!
//! Two packings are supported:
//!
//! * **LSB-first** (DEFLATE and little-endian Huffman-only): bits fill each byte from
//!   the least significant end, Huffman codes are stored bit-reversed so that the first
//!   code bit is the first bit read.
//! * **BE16** (big-endian Huffman-only): code bits fill 16-bit words from the most
//!   significant end and the words are stored big-endian.
//!
//! Writers keep the bits that do not yet form a whole output unit (a byte, or a
//! 16-bit word for BE16). These pending bits are the carry state of a chunked stream.

use bitvec::prelude::*;

//==================================================================================
// 1. Shared Traits
//==================================================================================

/// A destination for Huffman codes given MSB-first (canonical) order.
pub trait CodeSink {
    fn put_code(&mut self, code: u16, len: u8);

    /// Total bits accepted so far, including bits already drained.
    fn bits_written(&self) -> u64;
}

/// A bit-serial source used by the Huffman decoder.
pub trait BitSource {
    /// Next stream bit, or `None` when the readable range is exhausted.
    fn next_bit(&mut self) -> Option<bool>;
    fn position(&self) -> usize;
    fn set_position(&mut self, pos: usize);
}

/// Reverses the low `len` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, len: u8) -> u16 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - len as u32)
}

//==================================================================================
// 2. LSB-First Writer
//==================================================================================

#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    out: Vec<u8>,
    bitbuf: u64,
    bitcount: u32,
    total_bits: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Appends the low `n` bits of `value`, least significant bit first.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        if n == 0 {
            return;
        }
        let mask = if n == 32 { u32::MAX } else { (1u32 << n) - 1 };
        self.bitbuf |= ((value & mask) as u64) << self.bitcount;
        self.bitcount += n;
        self.total_bits += n as u64;
        while self.bitcount >= 8 {
            self.out.push(self.bitbuf as u8);
            self.bitbuf >>= 8;
            self.bitcount -= 8;
        }
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.bitcount > 0 {
            let pad = 8 - self.bitcount;
            self.write_bits(0, pad);
        }
    }

    /// Appends whole bytes. The writer must be byte aligned.
    pub fn write_aligned_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bitcount, 0);
        self.out.extend_from_slice(bytes);
        self.total_bits += 8 * bytes.len() as u64;
    }

    /// Bits written but not yet part of a whole byte.
    pub fn pending_bits(&self) -> u32 {
        self.bitcount
    }

    /// Number of whole bytes waiting to be drained.
    pub fn ready_bytes(&self) -> usize {
        self.out.len()
    }

    /// Takes every whole byte, keeping the pending bits.
    pub fn drain_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Flushes the pending bits into a final zero-padded byte.
    ///
    /// Returns the drained bytes and the number of valid bits in the last byte
    /// (0 when the last byte is fully used).
    pub fn finish(&mut self) -> (Vec<u8>, u8) {
        let valid = self.bitcount as u8;
        if self.bitcount > 0 {
            self.out.push(self.bitbuf as u8);
            self.bitbuf = 0;
            self.total_bits += (8 - self.bitcount) as u64;
            self.bitcount = 0;
        }
        (self.drain_bytes(), valid)
    }
}

impl CodeSink for BitWriter {
    #[inline]
    fn put_code(&mut self, code: u16, len: u8) {
        self.write_bits(reverse_bits(code, len) as u32, len as u32);
    }

    fn bits_written(&self) -> u64 {
        self.total_bits
    }
}

//==================================================================================
// 3. BE16 Writer
//==================================================================================

/// Packs codes MSB-first into 16-bit words, emitted big-endian.
#[derive(Debug, Clone, Default)]
pub struct Be16Writer {
    bits: BitVec<u16, Msb0>,
    total_bits: u64,
}

impl Be16Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits written but not yet part of a whole 16-bit word.
    pub fn pending_bits(&self) -> u32 {
        (self.bits.len() % 16) as u32
    }

    fn words_to_bytes(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    /// Takes every whole word, keeping the pending bits.
    pub fn drain_bytes(&mut self) -> Vec<u8> {
        let whole = self.bits.len() / 16 * 16;
        if whole == 0 {
            return Vec::new();
        }
        let rest = self.bits.split_off(whole);
        let bytes = Self::words_to_bytes(self.bits.as_raw_slice());
        self.bits = rest;
        bytes
    }

    /// Pads the last word with zero bits and drains everything.
    ///
    /// Returns the bytes and the number of valid bits in the final 16-bit word
    /// (0 when the word is fully used).
    pub fn finish(&mut self) -> (Vec<u8>, u8) {
        let valid = self.pending_bits() as u8;
        if valid > 0 {
            let padded = self.bits.len() + (16 - valid as usize);
            self.total_bits += (16 - valid) as u64;
            self.bits.resize(padded, false);
        }
        (self.drain_bytes(), valid)
    }
}

impl CodeSink for Be16Writer {
    #[inline]
    fn put_code(&mut self, code: u16, len: u8) {
        for i in (0..len).rev() {
            self.bits.push((code >> i) & 1 == 1);
        }
        self.total_bits += len as u64;
    }

    fn bits_written(&self) -> u64 {
        self.total_bits
    }
}

//==================================================================================
// 4. Readers
//==================================================================================

/// LSB-first reader over a byte slice, bounded by an end bit position.
#[derive(Debug, Clone)]
pub struct LsbReader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> LsbReader<'a> {
    pub fn new(data: &'a [u8], start_bit: usize, end_bit: usize) -> Self {
        Self {
            data,
            pos: start_bit,
            end: end_bit.min(data.len() * 8),
        }
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    /// Reads an `n`-bit little-endian value, or `None` if fewer than `n` bits remain.
    /// The position is unchanged on `None`.
    pub fn read_bits(&mut self, n: u32) -> Option<u32> {
        if (n as usize) > self.remaining() {
            return None;
        }
        let mut value = 0u32;
        for i in 0..n {
            let p = self.pos + i as usize;
            let bit = (self.data[p / 8] >> (p % 8)) & 1;
            value |= (bit as u32) << i;
        }
        self.pos += n as usize;
        Some(value)
    }

    pub fn align_to_byte(&mut self) {
        self.pos = (self.pos + 7) / 8 * 8;
    }

    /// Byte index of an aligned position.
    pub fn byte_position(&self) -> usize {
        self.pos / 8
    }
}

impl BitSource for LsbReader<'_> {
    #[inline]
    fn next_bit(&mut self) -> Option<bool> {
        if self.pos >= self.end {
            return None;
        }
        let bit = (self.data[self.pos / 8] >> (self.pos % 8)) & 1;
        self.pos += 1;
        Some(bit == 1)
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }
}

/// MSB-first reader for BE16 streams.
///
/// Big-endian words read MSB-first give the same bit sequence as their bytes read
/// MSB-first, so the reader walks the bytes directly.
#[derive(Debug, Clone)]
pub struct Be16Reader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
    end: usize,
}

impl<'a> Be16Reader<'a> {
    pub fn new(data: &'a [u8], start_bit: usize, end_bit: usize) -> Self {
        let bits = data.view_bits::<Msb0>();
        Self {
            bits,
            pos: start_bit,
            end: end_bit.min(bits.len()),
        }
    }
}

impl BitSource for Be16Reader<'_> {
    #[inline]
    fn next_bit(&mut self) -> Option<bool> {
        if self.pos >= self.end {
            return None;
        }
        let bit = self.bits[self.pos];
        self.pos += 1;
        Some(bit)
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_writer_packs_from_low_bits() {
        let mut w = BitWriter::new();
        w.write_bits(0b1, 1);
        w.write_bits(0b01, 2);
        w.write_bits(0b11111, 5);
        let (bytes, valid) = w.finish();
        assert_eq!(bytes, vec![0b1111_1011]);
        assert_eq!(valid, 0);
    }

    #[test]
    fn test_lsb_writer_keeps_pending_bits_across_drains() {
        let mut w = BitWriter::new();
        w.write_bits(0x2AB, 10);
        assert_eq!(w.drain_bytes(), vec![0xAB]);
        assert_eq!(w.pending_bits(), 2);
        w.write_bits(0, 3);
        let (bytes, valid) = w.finish();
        assert_eq!(bytes, vec![0b0000_0010]);
        assert_eq!(valid, 5);
        assert_eq!(w.bits_written(), 16);
    }

    #[test]
    fn test_codes_are_reversed_for_lsb_packing() {
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        let mut w = BitWriter::new();
        w.put_code(0b110, 3);
        let (bytes, valid) = w.finish();
        assert_eq!(bytes, vec![0b011]);
        assert_eq!(valid, 3);
    }

    #[test]
    fn test_be16_writer_fills_words_msb_first() {
        let mut w = Be16Writer::new();
        w.put_code(0b1, 1);
        w.put_code(0b0000_0001, 8);
        assert!(w.drain_bytes().is_empty());
        assert_eq!(w.pending_bits(), 9);
        let (bytes, valid) = w.finish();
        assert_eq!(bytes, vec![0b1000_0000, 0b1000_0000]);
        assert_eq!(valid, 9);
    }

    #[test]
    fn test_be16_reader_reads_back_writer_output() {
        let mut w = Be16Writer::new();
        let codes = [(0b101u16, 3u8), (0x7FFF, 15), (0b0, 1), (0b11, 2)];
        for &(c, l) in &codes {
            w.put_code(c, l);
        }
        let (bytes, valid) = w.finish();
        assert_eq!(bytes.len(), 4);
        assert_eq!(valid, 5);

        let mut r = Be16Reader::new(&bytes, 0, 21);
        for &(c, l) in &codes {
            let mut v = 0u16;
            for _ in 0..l {
                v = (v << 1) | r.next_bit().unwrap() as u16;
            }
            assert_eq!(v, c);
        }
        assert_eq!(r.next_bit(), None);
    }

    #[test]
    fn test_lsb_reader_respects_end_and_leaves_position_on_short_read() {
        let data = [0xFFu8, 0x01];
        let mut r = LsbReader::new(&data, 0, 12);
        assert_eq!(r.read_bits(8), Some(0xFF));
        assert_eq!(r.read_bits(5), None);
        assert_eq!(r.position(), 8);
        assert_eq!(r.read_bits(4), Some(0x1));
        assert_eq!(r.next_bit(), None);
    }
}
