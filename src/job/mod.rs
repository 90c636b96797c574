// In: src/job/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Streaming Job Driver
// ====================================================================================
//
// A `Job` is the session object of one logical stream at a time. Its life follows
// the state machine in `state.rs`:
//
//   1. [Job::new(path)]           -> binds the job to an execution engine. (Ready)
//
//   2. [Job::begin(operation)]    -> arms a compress or decompress operation, with
//                                    its mode flags, table and dictionary.
//
//   3. [Job::execute(FIRST ...)]  -> opens the carried stream (`stream.rs`) after the
//                                    engine's capability checks. (Streaming)
//
//   4. [Job::execute(...)]        -> every chunk runs against a savepoint of the stream
//                                    and is committed only if its output fits the
//                                    caller's buffer. Otherwise the stream is rolled
//                                    back, `MoreOutputNeeded` is returned and the same
//                                    chunk may be retried.
//
//   5. [Job::execute(LAST)]       -> flushes pending bits, records `last_bit_offset`
//                                    and the checksums. (Done)
//
//   6. [Job::reinit / finalize]   -> back to Ready, or release the job.
//
// ====================================================================================

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::engine::{self, ExecutionEngine};
use crate::error::{JobError, ProtocolError, TableError};
use crate::table::{HuffmanTable, TableCodes};
use crate::types::{ChunkFlags, CompressionLevel, ExecutionPath, JobFlags};

pub mod driver;
pub mod overflow;
pub mod state;
pub mod stream;
pub mod wrapper;

pub use driver::{compress_in_chunks, decompress_in_chunks, ChunkSizes, StreamDriver};
pub use overflow::{stored_block_count, worst_case_compressed_size};
pub use state::JobPhase;
pub use stream::ChunkOutcome;

use state::JobState;
use stream::{CompressStream, DecompressStream, Stream};

//==================================================================================
// 1. Operation Settings
//==================================================================================

/// Parameters of a compress operation. They hold for the whole logical stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressSettings<'a> {
    /// `None` uses the configured default level.
    pub level: Option<CompressionLevel>,
    pub flags: JobFlags,
    pub huffman_table: Option<&'a HuffmanTable>,
    pub dictionary: Option<&'a Dictionary>,
}

impl<'a> CompressSettings<'a> {
    pub fn new(flags: JobFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_table(mut self, table: &'a HuffmanTable) -> Self {
        self.huffman_table = Some(table);
        self
    }

    pub fn with_dictionary(mut self, dictionary: &'a Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }
}

/// Parameters of a decompress operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompressSettings<'a> {
    pub flags: JobFlags,
    pub huffman_table: Option<&'a HuffmanTable>,
    pub dictionary: Option<&'a Dictionary>,
    /// Bits to skip at the start of the first chunk.
    pub ignore_start_bits: u8,
    /// Padding bits to drop at the end of the LAST chunk.
    pub ignore_end_bits: u8,
}

impl<'a> DecompressSettings<'a> {
    pub fn new(flags: JobFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: &'a HuffmanTable) -> Self {
        self.huffman_table = Some(table);
        self
    }

    pub fn with_dictionary(mut self, dictionary: &'a Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_ignore_bits(mut self, start: u8, end: u8) -> Self {
        self.ignore_start_bits = start;
        self.ignore_end_bits = end;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Compress(CompressSettings<'a>),
    Decompress(DecompressSettings<'a>),
}

/// Byte counts of one successful `execute`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub consumed: usize,
    pub produced: usize,
}

//==================================================================================
// 2. The Job
//==================================================================================

pub struct Job<'a> {
    engine: Box<dyn ExecutionEngine>,
    config: Arc<EngineConfig>,
    state: JobState<'a>,
    total_in: u64,
    total_out: u64,
    last_bit_offset: u8,
    crc32: u32,
    adler32: u32,
    generated: Option<TableCodes>,
    finalized: bool,
}

impl std::fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("path", &self.engine.path())
            .field("phase", &self.state.phase())
            .field("total_in", &self.total_in)
            .field("total_out", &self.total_out)
            .field("last_bit_offset", &self.last_bit_offset)
            .finish()
    }
}

impl<'a> Job<'a> {
    /// A job on `path` with the default configuration.
    pub fn new(path: ExecutionPath) -> Self {
        Self::with_config(path, Arc::new(EngineConfig::default()))
    }

    pub fn with_config(path: ExecutionPath, config: Arc<EngineConfig>) -> Self {
        let engine = engine::for_path(path, Arc::clone(&config));
        Self::with_engine(engine, config)
    }

    /// A job driven by an explicit engine, e.g. a hardware engine on a private accelerator.
    pub fn with_engine(engine: Box<dyn ExecutionEngine>, config: Arc<EngineConfig>) -> Self {
        log::debug!("initialized job on {}", engine.path());
        Self {
            engine,
            config,
            state: JobState::Ready(None),
            total_in: 0,
            total_out: 0,
            last_bit_offset: 0,
            crc32: 0,
            adler32: 1,
            generated: None,
            finalized: false,
        }
    }

    pub fn path(&self) -> ExecutionPath {
        self.engine.path()
    }

    pub fn phase(&self) -> JobPhase {
        self.state.phase()
    }

    /// Arms `operation` for the next stream. Only valid in the Ready phase.
    pub fn begin(&mut self, operation: Operation<'a>) -> Result<(), JobError> {
        match self.state {
            JobState::Ready(_) => {
                self.state = JobState::Ready(Some(operation));
                Ok(())
            }
            _ => Err(ProtocolError::BeginWhileStreaming.into()),
        }
    }

    /// Runs one chunk: consumes all of `input` and writes the chunk's output to the
    /// start of `output`.
    pub fn execute(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flags: ChunkFlags,
    ) -> Result<ChunkReport, JobError> {
        let armed = matches!(self.state, JobState::Ready(Some(_)));
        state::check_chunk(self.state.phase(), armed, flags)?;
        let last = flags.contains(ChunkFlags::LAST);

        // A failed chunk leaves the job as it found it: an armed Ready job keeps its
        // operation and a carried stream is rolled back to its savepoint.
        let (mut stream, savepoint) = match std::mem::replace(&mut self.state, JobState::Done) {
            JobState::Ready(Some(operation)) => {
                let opened = self.open_stream(&operation, last);
                self.state = JobState::Ready(Some(operation));
                (Box::new(opened?), None)
            }
            JobState::Streaming(mut stream) => {
                let savepoint = stream.savepoint();
                (stream, Some(savepoint))
            }
            other => {
                self.state = other;
                return Err(ProtocolError::NoOperation.into());
            }
        };

        let outcome = match self.engine.submit(&mut || stream.process(input, last)) {
            Ok(outcome) if outcome.bytes.len() > output.len() => {
                log::debug!(
                    "chunk needs {} output bytes but {} are available; nothing committed",
                    outcome.bytes.len(),
                    output.len()
                );
                Err(JobError::MoreOutputNeeded {
                    required: outcome.bytes.len(),
                    available: output.len(),
                })
            }
            other => other,
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(savepoint) = savepoint {
                    stream.rollback(savepoint);
                    self.state = JobState::Streaming(stream);
                }
                return Err(e);
            }
        };
        stream.release();
        let produced = outcome.bytes.len();
        output[..produced].copy_from_slice(&outcome.bytes);

        // Commit.
        if flags.contains(ChunkFlags::FIRST) {
            self.total_in = 0;
            self.total_out = 0;
            self.last_bit_offset = 0;
            self.generated = None;
        }
        self.total_in += input.len() as u64;
        self.total_out += produced as u64;
        self.crc32 = stream.crc32();
        self.adler32 = stream.adler32();
        log_metric!(
            "event" = "chunk_done",
            "path" = &self.engine.path(),
            "bytes_in" = &input.len(),
            "bytes_out" = &produced,
            "total_out" = &self.total_out
        );
        match state::next_phase(flags) {
            JobPhase::Done => {
                self.last_bit_offset = outcome.last_bit_offset;
                self.generated = stream.generated_codes();
                self.state = JobState::Done;
            }
            _ => self.state = JobState::Streaming(stream),
        }
        Ok(ChunkReport {
            consumed: input.len(),
            produced,
        })
    }

    fn open_stream(&self, operation: &Operation<'a>, single_chunk: bool) -> Result<Stream, JobError> {
        match operation {
            Operation::Compress(settings) => {
                let level = settings.level.unwrap_or(self.config.default_level);
                self.engine.check_compress(settings, level)?;
                let stream = CompressStream::open(settings, level, single_chunk, self.engine.as_ref())?;
                Ok(Stream::Compress(stream))
            }
            Operation::Decompress(settings) => {
                self.engine.check_decompress(settings)?;
                Ok(Stream::Decompress(DecompressStream::open(settings)?))
            }
        }
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Valid bits in the last byte (last 16-bit word for BE16) written by a finished
    /// compression. 0 means the last unit is fully used.
    pub fn last_bit_offset(&self) -> u8 {
        self.last_bit_offset
    }

    /// CRC-32 of the uncompressed data processed so far.
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn adler32(&self) -> u32 {
        self.adler32
    }

    /// Stores the codes a finished dynamic Huffman-only compression generated.
    pub fn export_generated_table(&self, table: &mut HuffmanTable) -> Result<(), JobError> {
        let codes = self.generated.clone().ok_or(TableError::Missing)?;
        table.install_generated(codes)
    }

    /// Returns the job to Ready for a new logical stream. The armed operation is dropped.
    pub fn reinit(&mut self) {
        self.state = JobState::Ready(None);
        self.total_in = 0;
        self.total_out = 0;
        self.last_bit_offset = 0;
        self.crc32 = 0;
        self.adler32 = 1;
        self.generated = None;
    }

    /// Releases the job.
    pub fn finalize(mut self) -> Result<(), JobError> {
        self.finalized = true;
        log::debug!(
            "finalized job on {} ({} bytes in, {} bytes out)",
            self.engine.path(),
            self.total_in,
            self.total_out
        );
        Ok(())
    }
}

#[cfg(test)]
thread_local! {
    static UNFINALIZED_DROPS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Jobs dropped without `finalize` on this thread.
#[cfg(test)]
pub(crate) fn unfinalized_drops() -> usize {
    UNFINALIZED_DROPS.with(|count| count.get())
}

impl Drop for Job<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            #[cfg(test)]
            UNFINALIZED_DROPS.with(|count| count.set(count.get() + 1));
            log::warn!(
                "job on {} dropped without finalize in phase {:?}",
                self.engine.path(),
                self.state.phase()
            );
        }
    }
}
