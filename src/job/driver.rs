//! Chunk-loop helpers on top of `Job::execute`.
//!
//! `StreamDriver` owns the FIRST/LAST bookkeeping so a caller only pushes chunks and
//! finishes. `compress_in_chunks` / `decompress_in_chunks` run a whole buffer through
//! a job in chunks of the requested sizes, writing into one output buffer the way a
//! caller advancing `next_out` would.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::JobError;
use crate::job::{ChunkReport, CompressSettings, DecompressSettings, Job, Operation};
use crate::types::ChunkFlags;

/// How a buffer is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizes {
    /// The whole buffer in one FIRST|LAST chunk.
    Single,
    Fixed(usize),
    /// Sizes drawn uniformly from `min..max` by a seeded generator.
    Random { min: usize, max: usize, seed: u64 },
}

impl ChunkSizes {
    /// Byte ranges covering `len` bytes. Always at least one range, possibly empty.
    pub fn split(&self, len: usize) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let mut rng = match *self {
            ChunkSizes::Random { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        loop {
            let size = match *self {
                ChunkSizes::Single => len,
                ChunkSizes::Fixed(n) => n.max(1),
                ChunkSizes::Random { min, max, .. } => match rng.as_mut() {
                    Some(rng) if max > min.max(1) => rng.random_range(min.max(1)..max),
                    _ => min.max(1),
                },
            };
            let end = (start + size).min(len);
            ranges.push(start..end);
            start = end;
            if start >= len {
                return ranges;
            }
        }
    }
}

/// Feeds a job chunk by chunk, setting FIRST and LAST itself.
#[derive(Debug)]
pub struct StreamDriver<'j, 'a> {
    job: &'j mut Job<'a>,
    started: bool,
}

impl<'j, 'a> StreamDriver<'j, 'a> {
    /// Arms `operation` on `job`, which must be Ready.
    pub fn new(job: &'j mut Job<'a>, operation: Operation<'a>) -> Result<Self, JobError> {
        job.begin(operation)?;
        Ok(Self { job, started: false })
    }

    fn flags(&self, last: bool) -> ChunkFlags {
        let mut flags = ChunkFlags::empty();
        if !self.started {
            flags |= ChunkFlags::FIRST;
        }
        if last {
            flags |= ChunkFlags::LAST;
        }
        flags
    }

    /// Executes a chunk that is not the last one.
    pub fn push(&mut self, input: &[u8], output: &mut [u8]) -> Result<ChunkReport, JobError> {
        let report = self.job.execute(input, output, self.flags(false))?;
        self.started = true;
        Ok(report)
    }

    /// Executes the last chunk of the stream.
    pub fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<ChunkReport, JobError> {
        let report = self.job.execute(input, output, self.flags(true))?;
        self.started = true;
        Ok(report)
    }

    pub fn job(&self) -> &Job<'a> {
        self.job
    }
}

fn run_in_chunks<'a>(
    job: &mut Job<'a>,
    operation: Operation<'a>,
    input: &[u8],
    sizes: ChunkSizes,
    capacity: usize,
) -> Result<Vec<u8>, JobError> {
    let mut output = vec![0u8; capacity];
    let mut written = 0;
    let ranges = sizes.split(input.len());
    let count = ranges.len();
    let mut driver = StreamDriver::new(job, operation)?;
    for (i, range) in ranges.into_iter().enumerate() {
        let chunk = &input[range];
        let report = if i + 1 == count {
            driver.finish(chunk, &mut output[written..])?
        } else {
            driver.push(chunk, &mut output[written..])?
        };
        written += report.produced;
    }
    output.truncate(written);
    Ok(output)
}

/// Compresses `source` through `job` and returns the stream. `capacity` bounds the
/// total output, as a caller's destination buffer would.
pub fn compress_in_chunks<'a>(
    job: &mut Job<'a>,
    settings: CompressSettings<'a>,
    source: &[u8],
    sizes: ChunkSizes,
    capacity: usize,
) -> Result<Vec<u8>, JobError> {
    run_in_chunks(job, Operation::Compress(settings), source, sizes, capacity)
}

/// Decompresses `compressed` through `job`. `capacity` bounds the decoded size.
pub fn decompress_in_chunks<'a>(
    job: &mut Job<'a>,
    settings: DecompressSettings<'a>,
    compressed: &[u8],
    sizes: ChunkSizes,
    capacity: usize,
) -> Result<Vec<u8>, JobError> {
    run_in_chunks(job, Operation::Decompress(settings), compressed, sizes, capacity)
}
