// In: src/job/stream.rs

//! Carried stream state of an armed operation.
//!
//! A `Stream` is everything that must survive between two chunks: the match finder
//! history, the pending bits of the output, the decoder's partial symbol, running
//! checksums and the verify decoder. The job takes a `Savepoint` before each chunk
//! and rolls back to it when the chunk fails or its output does not fit, which is
//! what makes a `MoreOutputNeeded` failure side-effect free. A compress savepoint
//! copies everything except the match finder, whose own journal undoes the chunk.

use std::sync::Arc;

use crate::bridge::format::MAX_STORED_BLOCK_SIZE;
use crate::dictionary::Dictionary;
use crate::engine::ExecutionEngine;
use crate::error::{DataError, JobError, ProtocolError, TableError};
use crate::job::overflow::prefer_stored;
use crate::job::wrapper;
use crate::job::{CompressSettings, DecompressSettings};
use crate::kernels::bitstream::{Be16Writer, BitWriter, CodeSink};
use crate::kernels::checksum::{Adler32, Crc32};
use crate::kernels::deflate::{
    dynamic_header_bits, stored_block_bits, write_block_header, write_dynamic_header,
    write_stored_block, DeflateCodes, BTYPE_DYNAMIC, BTYPE_FIXED,
};
use crate::kernels::histogram::Histogram;
use crate::kernels::huffman::{CodeBook, MAX_CODE_BITS};
use crate::kernels::inflate::{BitOrder, Inflater, InputEnd, StreamFormat};
use crate::kernels::lz77::{self, MatchFinder, Token};
use crate::table::TableCodes;
use crate::types::{CompressionLevel, JobFlags};

/// What one executed chunk produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub bytes: Vec<u8>,
    /// Valid bits in the last byte (or BE16 word) of a finished stream; 0 when full.
    pub last_bit_offset: u8,
}

#[derive(Debug, Clone)]
pub(crate) enum Stream {
    Compress(CompressStream),
    Decompress(DecompressStream),
}

/// State to roll a stream back to. Holds no match finder.
#[derive(Debug)]
pub(crate) struct Savepoint(Stream);

impl Stream {
    pub(crate) fn savepoint(&mut self) -> Savepoint {
        match self {
            Stream::Compress(s) => {
                let finder = s.finder.take();
                let saved = s.clone();
                s.finder = finder;
                if let Some(finder) = s.finder.as_mut() {
                    finder.begin_journal();
                }
                Savepoint(Stream::Compress(saved))
            }
            Stream::Decompress(s) => Savepoint(Stream::Decompress(s.clone())),
        }
    }

    pub(crate) fn rollback(&mut self, savepoint: Savepoint) {
        match (self, savepoint.0) {
            (Stream::Compress(s), Stream::Compress(mut saved)) => {
                saved.finder = s.finder.take().map(|mut finder| {
                    finder.rollback();
                    finder
                });
                *s = saved;
            }
            (this, saved) => *this = saved,
        }
    }

    /// Keeps the chunk run since the last savepoint.
    pub(crate) fn release(&mut self) {
        if let Stream::Compress(CompressStream { finder: Some(finder), .. }) = self {
            finder.commit_journal();
        }
    }

    pub(crate) fn process(&mut self, input: &[u8], last: bool) -> Result<ChunkOutcome, JobError> {
        match self {
            Stream::Compress(s) => s.process(input, last),
            Stream::Decompress(s) => s.process(input, last),
        }
    }

    /// CRC-32 of the uncompressed bytes seen so far.
    pub(crate) fn crc32(&self) -> u32 {
        match self {
            Stream::Compress(s) => s.crc.value(),
            Stream::Decompress(s) => s.crc.value(),
        }
    }

    pub(crate) fn adler32(&self) -> u32 {
        match self {
            Stream::Compress(s) => s.adler.value(),
            Stream::Decompress(s) => s.adler.value(),
        }
    }

    pub(crate) fn generated_codes(&self) -> Option<TableCodes> {
        match self {
            Stream::Compress(s) => s.generated.clone().map(TableCodes::HuffmanOnly),
            Stream::Decompress(_) => None,
        }
    }
}

//==================================================================================
// 1. Mode Resolution
//==================================================================================

/// How DEFLATE blocks get their codes.
#[derive(Debug, Clone)]
pub(crate) enum BlockCoding {
    /// The fixed codes of RFC 1951.
    Fixed,
    /// A caller table, described in a dynamic block header.
    Static(Arc<DeflateCodes>),
    /// Codes built per block from the block's own symbols.
    Dynamic,
}

#[derive(Debug, Clone)]
pub(crate) enum LiteralCoding {
    Static(Arc<CodeBook>),
    Dynamic,
}

#[derive(Debug, Clone)]
pub(crate) enum CompressMode {
    Blocks(BlockCoding),
    Canned(Arc<DeflateCodes>),
    HuffmanOnly(LiteralCoding),
}

impl CompressMode {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            CompressMode::Blocks(BlockCoding::Fixed) => "fixed",
            CompressMode::Blocks(BlockCoding::Static(_)) => "static",
            CompressMode::Blocks(BlockCoding::Dynamic) => "dynamic",
            CompressMode::Canned(_) => "canned",
            CompressMode::HuffmanOnly(LiteralCoding::Static(_)) => "static huffman-only",
            CompressMode::HuffmanOnly(LiteralCoding::Dynamic) => "dynamic huffman-only",
        }
    }
}

fn invalid(reason: &str) -> JobError {
    ProtocolError::InvalidFlags(reason.to_string()).into()
}

pub(crate) fn resolve_compress_mode(settings: &CompressSettings<'_>) -> Result<CompressMode, JobError> {
    let flags = settings.flags;
    if flags.intersects(JobFlags::DECOMPRESS_ENABLE | JobFlags::RANDOM_ACCESS) {
        return Err(invalid("DECOMPRESS_ENABLE and RANDOM_ACCESS do not apply to compression"));
    }
    if flags.is_huffman_only() {
        if flags.intersects(JobFlags::CANNED_MODE | JobFlags::ZLIB_MODE) {
            return Err(invalid("Huffman-only streams are neither canned nor zlib framed"));
        }
        if flags.contains(JobFlags::DYNAMIC_HUFFMAN) {
            return Ok(CompressMode::HuffmanOnly(LiteralCoding::Dynamic));
        }
        let table = settings.huffman_table.ok_or(TableError::Missing)?;
        return Ok(CompressMode::HuffmanOnly(LiteralCoding::Static(table.literal_codes()?)));
    }
    if flags.contains(JobFlags::HUFFMAN_BE) {
        return Err(invalid("HUFFMAN_BE applies to Huffman-only streams"));
    }
    if flags.contains(JobFlags::CANNED_MODE) {
        if flags.intersects(JobFlags::ZLIB_MODE | JobFlags::DYNAMIC_HUFFMAN) {
            return Err(invalid("canned mode takes neither ZLIB_MODE nor DYNAMIC_HUFFMAN"));
        }
        let table = settings.huffman_table.ok_or(TableError::Missing)?;
        return Ok(CompressMode::Canned(table.deflate_codes()?));
    }
    if flags.contains(JobFlags::NO_HEADERS) {
        return Err(invalid("NO_HEADERS needs CANNED_MODE or GEN_LITERALS"));
    }
    if flags.contains(JobFlags::DYNAMIC_HUFFMAN) {
        return Ok(CompressMode::Blocks(BlockCoding::Dynamic));
    }
    match settings.huffman_table {
        Some(table) => Ok(CompressMode::Blocks(BlockCoding::Static(table.deflate_codes()?))),
        None => Ok(CompressMode::Blocks(BlockCoding::Fixed)),
    }
}

fn decompress_format(settings: &DecompressSettings<'_>) -> Result<(StreamFormat, BitOrder), JobError> {
    let flags = settings.flags;
    let order = if flags.contains(JobFlags::HUFFMAN_BE) {
        BitOrder::BigEndian16
    } else {
        BitOrder::LittleEndian
    };
    if flags.is_huffman_only() {
        if flags.intersects(JobFlags::CANNED_MODE | JobFlags::ZLIB_MODE) {
            return Err(invalid("Huffman-only streams are neither canned nor zlib framed"));
        }
        let table = settings.huffman_table.ok_or(TableError::Missing)?;
        let decoder = table.literal_decoder()?;
        return Ok((StreamFormat::HuffmanOnly { decoder, order }, order));
    }
    if flags.contains(JobFlags::HUFFMAN_BE) {
        return Err(invalid("HUFFMAN_BE applies to Huffman-only streams"));
    }
    if flags.contains(JobFlags::CANNED_MODE) {
        if flags.contains(JobFlags::ZLIB_MODE) {
            return Err(invalid("canned streams are not zlib framed"));
        }
        let table = settings.huffman_table.ok_or(TableError::Missing)?;
        return Ok((StreamFormat::Canned(table.deflate_decoders()?), order));
    }
    Ok((StreamFormat::Deflate, order))
}

/// First symbol counted in `histogram` that `codes` cannot encode.
fn first_uncoded(codes: &DeflateCodes, histogram: &Histogram) -> Option<u16> {
    let litlen = histogram
        .literal_lengths
        .iter()
        .enumerate()
        .find(|&(s, &c)| c > 0 && !codes.litlen.has_code(s));
    let distance = histogram
        .distances
        .iter()
        .enumerate()
        .find(|&(s, &c)| c > 0 && !codes.distance.has_code(s));
    litlen.or(distance).map(|(s, _)| s as u16)
}

fn put_literals<S: CodeSink>(sink: &mut S, book: &CodeBook, input: &[u8]) -> Result<(), TableError> {
    for &b in input {
        if !book.has_code(b as usize) {
            return Err(TableError::SymbolNotCoded(b as u16));
        }
        book.put(sink, b as usize);
    }
    Ok(())
}

//==================================================================================
// 2. Compression
//==================================================================================

/// Decodes the compressor's own output and compares it with the input.
#[derive(Debug, Clone)]
struct Verifier {
    inflater: Inflater,
    crc: Crc32,
    len: u64,
}

impl Verifier {
    fn new(format: StreamFormat, dictionary: Option<&Dictionary>) -> Self {
        let mut inflater = Inflater::new(format);
        if let Some(d) = dictionary {
            inflater = inflater.with_history(d.history());
        }
        Self {
            inflater,
            crc: Crc32::new(),
            len: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompressStream {
    mode: CompressMode,
    order: BitOrder,
    finder: Option<MatchFinder>,
    writer: BitWriter,
    be16: Option<Be16Writer>,
    zlib: bool,
    /// `Some(dictionary id)` until the zlib header has been written.
    zlib_header: Option<Option<u32>>,
    verifier: Option<Verifier>,
    verify_dynamic_literals: bool,
    verify_be16_limit: u8,
    crc: Crc32,
    adler: Adler32,
    total_in: u64,
    generated: Option<Arc<CodeBook>>,
}

impl CompressStream {
    /// Opens a stream for a FIRST chunk. `single_chunk` tells whether that chunk is
    /// also the LAST one.
    pub(crate) fn open(
        settings: &CompressSettings<'_>,
        level: CompressionLevel,
        single_chunk: bool,
        engine: &dyn ExecutionEngine,
    ) -> Result<Self, JobError> {
        let flags = settings.flags;
        let mode = resolve_compress_mode(settings)?;
        if matches!(mode, CompressMode::HuffmanOnly(LiteralCoding::Dynamic)) && !single_chunk {
            return Err(JobError::Unsupported {
                feature: "dynamic Huffman-only compression across several chunks",
                path: engine.path(),
            });
        }

        let order = if flags.contains(JobFlags::HUFFMAN_BE) {
            BitOrder::BigEndian16
        } else {
            BitOrder::LittleEndian
        };
        let literal_only = flags.contains(JobFlags::GEN_LITERALS);
        let finder = match &mode {
            CompressMode::HuffmanOnly(_) => None,
            _ if literal_only => None,
            _ => {
                let mut finder = MatchFinder::new(engine.match_effort(level, settings.dictionary));
                if let Some(d) = settings.dictionary {
                    finder.preload(d.history());
                }
                Some(finder)
            }
        };

        let verify = !flags.contains(JobFlags::OMIT_VERIFY);
        let verifier = if verify {
            match &mode {
                CompressMode::Blocks(_) => Some(Verifier::new(StreamFormat::Deflate, settings.dictionary)),
                CompressMode::Canned(codes) => Some(Verifier::new(
                    StreamFormat::Canned(Arc::new(codes.decoders()?)),
                    settings.dictionary,
                )),
                CompressMode::HuffmanOnly(LiteralCoding::Static(book)) => Some(Verifier::new(
                    StreamFormat::HuffmanOnly {
                        decoder: Arc::new(book.decoder()?),
                        order,
                    },
                    None,
                )),
                CompressMode::HuffmanOnly(LiteralCoding::Dynamic) => None,
            }
        } else {
            None
        };
        let verify_dynamic_literals =
            verify && matches!(mode, CompressMode::HuffmanOnly(LiteralCoding::Dynamic));

        let zlib = flags.contains(JobFlags::ZLIB_MODE);
        log::debug!(
            "opened {} compression stream on {} (level {:?}, flags {:?})",
            mode.name(),
            engine.path(),
            level,
            flags
        );
        Ok(Self {
            mode,
            order,
            finder,
            writer: BitWriter::new(),
            be16: (order == BitOrder::BigEndian16).then(Be16Writer::new),
            zlib,
            zlib_header: zlib.then(|| settings.dictionary.map(Dictionary::id)),
            verifier,
            verify_dynamic_literals,
            verify_be16_limit: engine.capabilities().max_be16_ignore_end_bits,
            crc: Crc32::new(),
            adler: Adler32::new(),
            total_in: 0,
            generated: None,
        })
    }

    fn process(&mut self, input: &[u8], last: bool) -> Result<ChunkOutcome, JobError> {
        let mut out = Vec::new();
        if let Some(dictionary_id) = self.zlib_header.take() {
            wrapper::write_header(&mut out, dictionary_id);
        }
        self.crc.update(input);
        self.adler.update(input);
        self.total_in += input.len() as u64;

        match self.mode.clone() {
            CompressMode::Blocks(coding) => self.encode_blocks(&coding, input, last)?,
            CompressMode::Canned(codes) => self.encode_canned(&codes, input, last)?,
            CompressMode::HuffmanOnly(LiteralCoding::Static(book)) => self.encode_literals(&book, input)?,
            CompressMode::HuffmanOnly(LiteralCoding::Dynamic) => {
                let histogram = Histogram::from_literals(input);
                let book = Arc::new(CodeBook::from_frequencies(histogram.literals(), MAX_CODE_BITS));
                self.encode_literals(&book, input)?;
                if self.verify_dynamic_literals {
                    let format = StreamFormat::HuffmanOnly {
                        decoder: Arc::new(book.decoder()?),
                        order: self.order,
                    };
                    self.verifier = Some(Verifier::new(format, None));
                }
                self.generated = Some(book);
            }
        }

        let (body, last_bit_offset) = match (&mut self.be16, last) {
            (Some(w), true) => w.finish(),
            (Some(w), false) => (w.drain_bytes(), 0),
            (None, true) => self.writer.finish(),
            (None, false) => (self.writer.drain_bytes(), 0),
        };
        self.verify(&body, last, last_bit_offset)?;
        out.extend_from_slice(&body);

        if last && self.zlib {
            wrapper::write_trailer(&mut out, self.adler.value());
        }
        Ok(ChunkOutcome {
            bytes: out,
            last_bit_offset: if self.zlib { 0 } else { last_bit_offset },
        })
    }

    fn tokenize(&mut self, segment: &[u8], tokens: &mut Vec<Token>) {
        tokens.clear();
        match &mut self.finder {
            Some(finder) => finder.tokenize(segment, tokens),
            None => lz77::literals(segment, tokens),
        }
    }

    fn encode_blocks(&mut self, coding: &BlockCoding, input: &[u8], last: bool) -> Result<(), JobError> {
        if input.is_empty() {
            if last {
                // An empty final block closes the stream.
                write_block_header(&mut self.writer, true, BTYPE_FIXED);
                DeflateCodes::fixed().encode_end_of_block(&mut self.writer);
            }
            return Ok(());
        }
        let segments = input.len().div_ceil(MAX_STORED_BLOCK_SIZE);
        let mut tokens = Vec::new();
        for (i, segment) in input.chunks(MAX_STORED_BLOCK_SIZE).enumerate() {
            let final_block = last && i + 1 == segments;
            self.tokenize(segment, &mut tokens);
            self.write_segment(coding, segment, &tokens, final_block)?;
        }
        Ok(())
    }

    /// Writes one segment as a Huffman block or a stored block, whichever is smaller.
    fn write_segment(
        &mut self,
        coding: &BlockCoding,
        segment: &[u8],
        tokens: &[Token],
        final_block: bool,
    ) -> Result<(), JobError> {
        let histogram = Histogram::from_tokens(tokens);
        let (btype, codes) = match coding {
            BlockCoding::Fixed => (BTYPE_FIXED, DeflateCodes::fixed()),
            BlockCoding::Static(codes) => (BTYPE_DYNAMIC, Arc::clone(codes)),
            BlockCoding::Dynamic => (BTYPE_DYNAMIC, Arc::new(DeflateCodes::for_counts(&histogram))),
        };
        if let Some(symbol) = first_uncoded(&codes, &histogram) {
            return Err(TableError::SymbolNotCoded(symbol).into());
        }
        let header_bits = if btype == BTYPE_FIXED {
            3
        } else {
            dynamic_header_bits(&codes)
        };
        let huffman_bits = header_bits + codes.data_cost(&histogram) + codes.eob_cost();
        let stored_bits = stored_block_bits(self.writer.pending_bits(), segment.len());

        if prefer_stored(stored_bits, huffman_bits) {
            write_stored_block(&mut self.writer, segment, final_block);
            log_metric!(
                "event" = "stored_block",
                "bytes" = &segment.len(),
                "huffman_bits" = &huffman_bits
            );
            return Ok(());
        }
        write_block_header(&mut self.writer, final_block, btype);
        if btype == BTYPE_DYNAMIC {
            write_dynamic_header(&mut self.writer, &codes);
        }
        codes.encode_tokens(&mut self.writer, tokens);
        codes.encode_end_of_block(&mut self.writer);
        Ok(())
    }

    fn encode_canned(&mut self, codes: &DeflateCodes, input: &[u8], last: bool) -> Result<(), JobError> {
        let mut tokens = Vec::new();
        for segment in input.chunks(MAX_STORED_BLOCK_SIZE) {
            self.tokenize(segment, &mut tokens);
            let histogram = Histogram::from_tokens(&tokens);
            if let Some(symbol) = first_uncoded(codes, &histogram) {
                return Err(TableError::SymbolNotCoded(symbol).into());
            }
            codes.encode_tokens(&mut self.writer, &tokens);
        }
        if last {
            codes.encode_end_of_block(&mut self.writer);
        }
        Ok(())
    }

    fn encode_literals(&mut self, book: &CodeBook, input: &[u8]) -> Result<(), JobError> {
        match &mut self.be16 {
            Some(w) => put_literals(w, book, input)?,
            None => put_literals(&mut self.writer, book, input)?,
        }
        Ok(())
    }

    fn verify(&mut self, body: &[u8], last: bool, last_bit_offset: u8) -> Result<(), JobError> {
        let Some(verifier) = self.verifier.as_mut() else {
            return Ok(());
        };
        let end = if last {
            let ignore_end_bits = match self.mode {
                CompressMode::HuffmanOnly(_) => self.order.ignore_end_bits(last_bit_offset),
                _ => 0,
            };
            if self.order == BitOrder::BigEndian16 && ignore_end_bits > self.verify_be16_limit {
                return Err(JobError::Verification(format!(
                    "the verify decoder cannot drop {} trailing bits of a big-endian stream",
                    ignore_end_bits
                )));
            }
            InputEnd::Final { ignore_end_bits }
        } else {
            InputEnd::More
        };

        let mut decoded = Vec::new();
        verifier
            .inflater
            .feed(body, end, &mut decoded)
            .map_err(|e| JobError::Verification(format!("the output does not decode: {}", e)))?;
        verifier.crc.update(&decoded);
        verifier.len += decoded.len() as u64;

        if last && (verifier.len != self.total_in || verifier.crc.value() != self.crc.value()) {
            return Err(JobError::Verification(format!(
                "decoded {} bytes with CRC {:#010x}, expected {} bytes with CRC {:#010x}",
                verifier.len,
                verifier.crc.value(),
                self.total_in,
                self.crc.value()
            )));
        }
        Ok(())
    }
}

//==================================================================================
// 3. Decompression
//==================================================================================

#[derive(Debug, Clone)]
pub(crate) struct DecompressStream {
    format: StreamFormat,
    inflater: Inflater,
    random_access: bool,
    ignore_start_bits: u8,
    ignore_end_bits: u8,
    dictionary: Option<(u32, Arc<[u8]>)>,
    zlib: bool,
    /// Bytes gathered until the zlib header is complete.
    header: Option<Vec<u8>>,
    trailer: Vec<u8>,
    crc: Crc32,
    adler: Adler32,
}

impl DecompressStream {
    pub(crate) fn open(settings: &DecompressSettings<'_>) -> Result<Self, JobError> {
        let (format, order) = decompress_format(settings)?;
        let zlib = settings.flags.contains(JobFlags::ZLIB_MODE);
        let dictionary = settings
            .dictionary
            .map(|d| (d.id(), Arc::<[u8]>::from(d.history())));
        let mut stream = Self {
            inflater: Inflater::new(format.clone()),
            format,
            random_access: settings.flags.contains(JobFlags::RANDOM_ACCESS),
            ignore_start_bits: settings.ignore_start_bits,
            ignore_end_bits: settings.ignore_end_bits,
            dictionary,
            zlib,
            header: zlib.then(Vec::new),
            trailer: Vec::new(),
            crc: Crc32::new(),
            adler: Adler32::new(),
        };
        if !zlib {
            let history = stream.dictionary.as_ref().map(|(_, h)| Arc::clone(h));
            stream.reset_inflater(history.as_deref());
        }
        log::debug!(
            "opened decompression stream ({:?} bit order, flags {:?})",
            order,
            settings.flags
        );
        Ok(stream)
    }

    fn reset_inflater(&mut self, history: Option<&[u8]>) {
        let mut inflater = Inflater::new(self.format.clone()).with_random_access(self.random_access);
        if let Some(h) = history {
            inflater = inflater.with_history(h);
        }
        inflater.skip_bits(self.ignore_start_bits as usize);
        self.inflater = inflater;
    }

    /// Consumes the zlib header from `input`. Returns the body bytes that follow it,
    /// or `None` while the header is still incomplete.
    fn take_zlib_header(&mut self, gathered: &mut Vec<u8>, input: &[u8]) -> Result<Option<Vec<u8>>, JobError> {
        gathered.extend_from_slice(input);
        let Some(header) = wrapper::read_header(gathered)? else {
            return Ok(None);
        };
        let body = gathered.split_off(header.encoded_len());

        let history = match header.dictionary_id {
            None => None,
            Some(expected) => match &self.dictionary {
                Some((id, history)) if *id == expected => Some(Arc::clone(history)),
                _ => return Err(JobError::NeedDictionary { expected }),
            },
        };
        self.reset_inflater(history.as_deref());
        Ok(Some(body))
    }

    fn process(&mut self, input: &[u8], last: bool) -> Result<ChunkOutcome, JobError> {
        let staged;
        let body: &[u8] = match self.header.take() {
            Some(mut gathered) => match self.take_zlib_header(&mut gathered, input)? {
                Some(rest) => {
                    staged = rest;
                    &staged
                }
                None if last => return Err(DataError::TruncatedStream.into()),
                None => {
                    self.header = Some(gathered);
                    return Ok(ChunkOutcome::default());
                }
            },
            None => input,
        };

        let end = if last {
            InputEnd::Final {
                ignore_end_bits: self.ignore_end_bits,
            }
        } else {
            InputEnd::More
        };
        let mut out = Vec::new();
        self.inflater.feed(body, end, &mut out)?;
        self.crc.update(&out);
        self.adler.update(&out);

        if self.zlib {
            self.trailer.extend(self.inflater.take_trailing());
            if last {
                wrapper::check_trailer(&self.trailer, self.adler.value())?;
            }
        }
        Ok(ChunkOutcome {
            bytes: out,
            last_bit_offset: 0,
        })
    }
}
