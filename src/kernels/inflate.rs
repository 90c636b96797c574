//! Resumable decoder for DEFLATE, canned and Huffman-only streams.
//!
//! Input may be split at any byte. The decoder checkpoints before every symbol and
//! every block header; when a chunk ends inside one, the position rolls back and the
//! unconsumed bytes are kept until the next `feed`.

use std::sync::{Arc, OnceLock};

use crate::error::DataError;
use crate::kernels::bitstream::{Be16Reader, BitSource, LsbReader};
use crate::kernels::deflate::{
    DeflateCodes, DeflateDecoders, CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA, END_OF_BLOCK,
    LEN_BASE, LEN_EXTRA, NUM_DISTANCE_SYMBOLS, NUM_LITLEN_SYMBOLS,
};
use crate::kernels::huffman::HuffmanDecoder;
use crate::types::levels::DEFLATE_WINDOW;

/// Bit packing of a Huffman-only stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    LittleEndian,
    BigEndian16,
}

impl BitOrder {
    /// Bits of padding to drop given the valid bits of the last unit.
    pub fn ignore_end_bits(&self, last_bit_offset: u8) -> u8 {
        match self {
            BitOrder::LittleEndian => (8 - last_bit_offset) & 7,
            BitOrder::BigEndian16 => (16 - last_bit_offset) & 15,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StreamFormat {
    /// Blocks with headers.
    Deflate,
    /// One headerless block coded with the given table, ended by EOB.
    Canned(Arc<DeflateDecoders>),
    /// Literal codes only, no EOB.
    HuffmanOnly {
        decoder: Arc<HuffmanDecoder>,
        order: BitOrder,
    },
}

/// How a fed chunk relates to the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    More,
    Final { ignore_end_bits: u8 },
}

#[derive(Debug, Clone)]
enum BlockState {
    Header,
    Stored { remaining: usize, final_block: bool },
    Coded { decoders: Arc<DeflateDecoders>, final_block: bool },
    Literals { decoder: Arc<HuffmanDecoder>, order: BitOrder },
    Done,
}

enum SymbolRun {
    EndOfBlock,
    NeedInput,
}

fn fixed_decoders() -> Result<Arc<DeflateDecoders>, DataError> {
    static FIXED: OnceLock<Arc<DeflateDecoders>> = OnceLock::new();
    if let Some(d) = FIXED.get() {
        return Ok(d.clone());
    }
    let decoders = Arc::new(DeflateCodes::fixed().decoders()?);
    Ok(FIXED.get_or_init(|| decoders).clone())
}

#[derive(Debug, Clone)]
pub struct Inflater {
    state: BlockState,
    input: Vec<u8>,
    bit_pos: usize,
    history: Vec<u8>,
    random_access: bool,
}

impl Inflater {
    pub fn new(format: StreamFormat) -> Self {
        let state = match format {
            StreamFormat::Deflate => BlockState::Header,
            StreamFormat::Canned(decoders) => BlockState::Coded {
                decoders,
                final_block: true,
            },
            StreamFormat::HuffmanOnly { decoder, order } => BlockState::Literals { decoder, order },
        };
        Self {
            state,
            input: Vec::new(),
            bit_pos: 0,
            history: Vec::new(),
            random_access: false,
        }
    }

    /// Seeds the back-reference window, as a preset dictionary does.
    pub fn with_history(mut self, history: &[u8]) -> Self {
        let tail = &history[history.len().saturating_sub(DEFLATE_WINDOW)..];
        self.history.extend_from_slice(tail);
        self
    }

    /// Accept a stream that ends without a final block.
    pub fn with_random_access(mut self, enabled: bool) -> Self {
        self.random_access = enabled;
        self
    }

    /// Skips leading bits of the first chunk.
    pub fn skip_bits(&mut self, bits: usize) {
        self.bit_pos += bits;
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, BlockState::Done)
    }

    /// Bytes fed after the end of the final block, from the next byte boundary on.
    pub fn take_trailing(&mut self) -> Vec<u8> {
        if !self.is_done() {
            return Vec::new();
        }
        let start = ((self.bit_pos + 7) / 8).min(self.input.len());
        let trailing = self.input.split_off(start);
        self.input.clear();
        self.bit_pos = 0;
        trailing
    }

    /// Decodes as much of the stream as the bytes fed so far allow.
    pub fn feed(&mut self, chunk: &[u8], end: InputEnd, out: &mut Vec<u8>) -> Result<(), DataError> {
        self.input.extend_from_slice(chunk);
        if self.is_done() {
            return Ok(());
        }

        let total_bits = self.input.len() * 8;
        let end_bit = match end {
            InputEnd::More => total_bits,
            InputEnd::Final { ignore_end_bits } => total_bits.saturating_sub(ignore_end_bits as usize),
        };

        let produced_from = self.history.len();
        let input = std::mem::take(&mut self.input);
        let result = match self.state.clone() {
            BlockState::Literals { decoder, order } => {
                self.run_literals(&input, end_bit, &decoder, order)
            }
            _ => self.run_blocks(&input, end_bit),
        };
        self.input = input;
        out.extend_from_slice(&self.history[produced_from..]);
        result?;

        if !self.is_done() {
            let consumed = (self.bit_pos / 8).min(self.input.len());
            self.input.drain(..consumed);
            self.bit_pos -= consumed * 8;
        }
        if self.history.len() > 2 * DEFLATE_WINDOW {
            let excess = self.history.len() - DEFLATE_WINDOW;
            self.history.drain(..excess);
        }

        if matches!(end, InputEnd::Final { .. }) && !self.is_done() && !self.random_access {
            if let BlockState::Literals { .. } = self.state {
                self.state = BlockState::Done;
            } else {
                return Err(DataError::TruncatedStream);
            }
        }
        Ok(())
    }

    //==============================================================================
    // Huffman-only
    //==============================================================================

    fn run_literals(
        &mut self,
        input: &[u8],
        end_bit: usize,
        decoder: &HuffmanDecoder,
        order: BitOrder,
    ) -> Result<(), DataError> {
        match order {
            BitOrder::LittleEndian => {
                let mut r = LsbReader::new(input, self.bit_pos, end_bit);
                self.decode_literals(&mut r, decoder)
            }
            BitOrder::BigEndian16 => {
                let mut r = Be16Reader::new(input, self.bit_pos, end_bit);
                self.decode_literals(&mut r, decoder)
            }
        }
    }

    fn decode_literals<R: BitSource>(&mut self, r: &mut R, decoder: &HuffmanDecoder) -> Result<(), DataError> {
        let result = loop {
            match decoder.decode(r) {
                Ok(Some(sym)) if (sym as usize) < 256 => self.history.push(sym as u8),
                Ok(Some(_)) => break Err(DataError::InvalidSymbol),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.bit_pos = r.position();
        result
    }

    //==============================================================================
    // Blocks
    //==============================================================================

    fn run_blocks(&mut self, input: &[u8], end_bit: usize) -> Result<(), DataError> {
        let mut r = LsbReader::new(input, self.bit_pos, end_bit);
        let result = self.decode_blocks(input, &mut r);
        self.bit_pos = r.position();
        result
    }

    fn decode_blocks(&mut self, input: &[u8], r: &mut LsbReader<'_>) -> Result<(), DataError> {
        loop {
            let checkpoint = r.position();
            let next = match self.state.clone() {
                BlockState::Done | BlockState::Literals { .. } => return Ok(()),
                BlockState::Header => match read_block_header(r)? {
                    Some(state) => state,
                    None => {
                        r.set_position(checkpoint);
                        return Ok(());
                    }
                },
                BlockState::Stored {
                    remaining,
                    final_block,
                } => {
                    let n = remaining.min(r.remaining() / 8);
                    if n == 0 && remaining > 0 {
                        return Ok(());
                    }
                    let start = r.byte_position();
                    self.history.extend_from_slice(&input[start..start + n]);
                    r.set_position(r.position() + 8 * n);
                    if remaining == n {
                        end_of_block(final_block)
                    } else {
                        BlockState::Stored {
                            remaining: remaining - n,
                            final_block,
                        }
                    }
                }
                BlockState::Coded {
                    decoders,
                    final_block,
                } => match self.decode_symbols(r, &decoders)? {
                    SymbolRun::EndOfBlock => end_of_block(final_block),
                    SymbolRun::NeedInput => return Ok(()),
                },
            };
            self.state = next;
        }
    }

    fn decode_symbols(&mut self, r: &mut LsbReader<'_>, decoders: &DeflateDecoders) -> Result<SymbolRun, DataError> {
        loop {
            let checkpoint = r.position();
            let Some(sym) = decoders.litlen.decode(r)? else {
                return Ok(SymbolRun::NeedInput);
            };
            let sym = sym as usize;
            if sym < END_OF_BLOCK {
                self.history.push(sym as u8);
                continue;
            }
            if sym == END_OF_BLOCK {
                return Ok(SymbolRun::EndOfBlock);
            }
            if sym >= NUM_LITLEN_SYMBOLS {
                return Err(DataError::InvalidSymbol);
            }
            let li = sym - 257;
            let Some(len_extra) = r.read_bits(LEN_EXTRA[li] as u32) else {
                r.set_position(checkpoint);
                return Ok(SymbolRun::NeedInput);
            };
            let length = LEN_BASE[li] as usize + len_extra as usize;

            let Some(dsym) = decoders.distance.decode(r)? else {
                r.set_position(checkpoint);
                return Ok(SymbolRun::NeedInput);
            };
            let dsym = dsym as usize;
            if dsym >= NUM_DISTANCE_SYMBOLS {
                return Err(DataError::InvalidSymbol);
            }
            let Some(dist_extra) = r.read_bits(DIST_EXTRA[dsym] as u32) else {
                r.set_position(checkpoint);
                return Ok(SymbolRun::NeedInput);
            };
            let distance = DIST_BASE[dsym] as usize + dist_extra as usize;

            if distance > self.history.len() {
                return Err(DataError::DistanceTooFar {
                    distance,
                    available: self.history.len(),
                });
            }
            let from = self.history.len() - distance;
            for i in 0..length {
                let b = self.history[from + i];
                self.history.push(b);
            }
        }
    }
}

fn end_of_block(final_block: bool) -> BlockState {
    if final_block {
        BlockState::Done
    } else {
        BlockState::Header
    }
}

/// Reads a block header. `Ok(None)` means the header is not complete yet.
fn read_block_header(r: &mut LsbReader<'_>) -> Result<Option<BlockState>, DataError> {
    let Some(bfinal) = r.read_bits(1) else {
        return Ok(None);
    };
    let Some(btype) = r.read_bits(2) else {
        return Ok(None);
    };
    let final_block = bfinal == 1;
    match btype {
        0 => {
            r.align_to_byte();
            let (Some(len), Some(nlen)) = (r.read_bits(16), r.read_bits(16)) else {
                return Ok(None);
            };
            if len as u16 != !(nlen as u16) {
                return Err(DataError::StoredLengthMismatch {
                    len: len as u16,
                    nlen: nlen as u16,
                });
            }
            Ok(Some(BlockState::Stored {
                remaining: len as usize,
                final_block,
            }))
        }
        1 => Ok(Some(BlockState::Coded {
            decoders: fixed_decoders()?,
            final_block,
        })),
        2 => Ok(read_dynamic_header(r)?.map(|decoders| BlockState::Coded {
            decoders: Arc::new(decoders),
            final_block,
        })),
        _ => Err(DataError::ReservedBlockType),
    }
}

fn read_dynamic_header(r: &mut LsbReader<'_>) -> Result<Option<DeflateDecoders>, DataError> {
    let (Some(hlit), Some(hdist), Some(hclen)) = (r.read_bits(5), r.read_bits(5), r.read_bits(4)) else {
        return Ok(None);
    };
    let hlit = hlit as usize + 257;
    let hdist = hdist as usize + 1;
    let hclen = hclen as usize + 4;

    let mut clen_lengths = [0u8; 19];
    for &sym in &CODE_LENGTH_ORDER[..hclen] {
        let Some(l) = r.read_bits(3) else {
            return Ok(None);
        };
        clen_lengths[sym] = l as u8;
    }
    let clen_decoder = HuffmanDecoder::from_lengths(&clen_lengths)?;

    let total = hlit + hdist;
    let mut lengths: Vec<u8> = Vec::with_capacity(total);
    while lengths.len() < total {
        let Some(sym) = clen_decoder.decode(r)? else {
            return Ok(None);
        };
        let (value, repeat) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                let Some(&prev) = lengths.last() else {
                    return Err(DataError::InvalidCodeLengths("repeat with no previous length"));
                };
                let Some(extra) = r.read_bits(2) else {
                    return Ok(None);
                };
                (prev, 3 + extra as usize)
            }
            17 => {
                let Some(extra) = r.read_bits(3) else {
                    return Ok(None);
                };
                (0, 3 + extra as usize)
            }
            18 => {
                let Some(extra) = r.read_bits(7) else {
                    return Ok(None);
                };
                (0, 11 + extra as usize)
            }
            _ => return Err(DataError::InvalidSymbol),
        };
        if lengths.len() + repeat > total {
            return Err(DataError::InvalidCodeLengths("repeat runs past the code length table"));
        }
        lengths.extend(std::iter::repeat(value).take(repeat));
    }

    if lengths[END_OF_BLOCK] == 0 {
        return Err(DataError::InvalidCodeLengths("missing end-of-block code"));
    }
    Ok(Some(DeflateDecoders {
        litlen: HuffmanDecoder::from_lengths(&lengths[..hlit])?,
        distance: HuffmanDecoder::from_lengths(&lengths[hlit..])?,
    }))
}

/// Decodes a complete DEFLATE stream in one call.
pub fn inflate_all(stream: &[u8]) -> Result<Vec<u8>, DataError> {
    let mut out = Vec::new();
    Inflater::new(StreamFormat::Deflate).feed(stream, InputEnd::Final { ignore_end_bits: 0 }, &mut out)?;
    Ok(out)
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::bitstream::BitWriter;
    use crate::kernels::deflate::{write_block_header, write_stored_block, BTYPE_FIXED};
    use crate::kernels::lz77::Token;

    fn fixed_stream(tokens: &[Token]) -> Vec<u8> {
        let codes = DeflateCodes::fixed();
        let mut w = BitWriter::new();
        write_block_header(&mut w, true, BTYPE_FIXED);
        codes.encode_tokens(&mut w, tokens);
        codes.encode_end_of_block(&mut w);
        w.finish().0
    }

    #[test]
    fn test_fixed_block_with_overlapping_match() {
        let tokens = [
            Token::Literal(b'a'),
            Token::Literal(b'b'),
            Token::Match { length: 10, distance: 2 },
        ];
        assert_eq!(inflate_all(&fixed_stream(&tokens)).unwrap(), b"abababababab");
    }

    #[test]
    fn test_resumes_across_every_split_point() {
        let tokens = [
            Token::Literal(b'x'),
            Token::Match { length: 40, distance: 1 },
            Token::Literal(b'y'),
            Token::Match { length: 258, distance: 2 },
        ];
        let stream = fixed_stream(&tokens);
        let expected = inflate_all(&stream).unwrap();
        for split in 0..stream.len() {
            let mut inflater = Inflater::new(StreamFormat::Deflate);
            let mut out = Vec::new();
            inflater.feed(&stream[..split], InputEnd::More, &mut out).unwrap();
            inflater
                .feed(&stream[split..], InputEnd::Final { ignore_end_bits: 0 }, &mut out)
                .unwrap();
            assert_eq!(out, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_stored_blocks_and_trailing_bytes() {
        let mut w = BitWriter::new();
        write_stored_block(&mut w, b"hello ", false);
        write_stored_block(&mut w, b"world", true);
        let (mut stream, _) = w.finish();
        stream.extend_from_slice(&[1, 2, 3, 4]);

        let mut inflater = Inflater::new(StreamFormat::Deflate);
        let mut out = Vec::new();
        inflater.feed(&stream[..9], InputEnd::More, &mut out).unwrap();
        inflater
            .feed(&stream[9..], InputEnd::Final { ignore_end_bits: 0 }, &mut out)
            .unwrap();
        assert_eq!(out, b"hello world");
        assert!(inflater.is_done());
        assert_eq!(inflater.take_trailing(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_stream_is_reported_at_final_chunk() {
        let stream = fixed_stream(&[Token::Literal(b'q'); 20]);
        let mut out = Vec::new();
        let err = Inflater::new(StreamFormat::Deflate)
            .feed(&stream[..stream.len() - 2], InputEnd::Final { ignore_end_bits: 0 }, &mut out)
            .unwrap_err();
        assert_eq!(err, DataError::TruncatedStream);

        let mut random_access = Inflater::new(StreamFormat::Deflate).with_random_access(true);
        random_access
            .feed(&stream[..stream.len() - 2], InputEnd::Final { ignore_end_bits: 0 }, &mut out)
            .unwrap();
    }

    #[test]
    fn test_history_enables_dictionary_references() {
        let tokens = [Token::Match { length: 5, distance: 5 }];
        let stream = fixed_stream(&tokens);
        let mut out = Vec::new();
        Inflater::new(StreamFormat::Deflate)
            .with_history(b"hello")
            .feed(&stream, InputEnd::Final { ignore_end_bits: 0 }, &mut out)
            .unwrap();
        assert_eq!(out, b"hello");

        assert!(matches!(
            inflate_all(&stream),
            Err(DataError::DistanceTooFar { distance: 5, available: 0 })
        ));
    }

    #[test]
    fn test_reserved_block_type_rejected() {
        assert_eq!(inflate_all(&[0b111]).unwrap_err(), DataError::ReservedBlockType);
    }

    #[test]
    fn test_ignore_end_bits() {
        assert_eq!(BitOrder::LittleEndian.ignore_end_bits(0), 0);
        assert_eq!(BitOrder::LittleEndian.ignore_end_bits(3), 5);
        assert_eq!(BitOrder::BigEndian16.ignore_end_bits(0), 0);
        assert_eq!(BitOrder::BigEndian16.ignore_end_bits(3), 13);
    }
}
