// In: src/bridge/stateless_api.rs

//! One-shot helpers over a single-chunk job.
//!
//! Each call creates a job, runs the whole buffer as one FIRST|LAST chunk and
//! finalizes the job. When the destination turns out too small the chunk is retried
//! with the size the job asked for, which is safe because a failed chunk commits
//! nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::JobError;
use crate::job::{
    worst_case_compressed_size, CompressSettings, DecompressSettings, Job, Operation,
};
use crate::types::{ChunkFlags, CompressionLevel, ExecutionPath, JobFlags};

/// Table-free compression options, loadable from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressOptions {
    #[serde(default)]
    pub path: ExecutionPath,
    #[serde(default)]
    pub level: Option<CompressionLevel>,
    #[serde(default)]
    pub flags: JobFlags,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompressOptions {
    #[serde(default)]
    pub path: ExecutionPath,
    #[serde(default)]
    pub flags: JobFlags,
    #[serde(default)]
    pub ignore_end_bits: u8,
}

/// The result of a one-shot compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    /// Valid bits of the last byte (or BE16 word); needed to decode Huffman-only output.
    pub last_bit_offset: u8,
    pub crc32: u32,
}

fn run_single<'a>(
    job: &mut Job<'a>,
    operation: Operation<'a>,
    input: &[u8],
    capacity: usize,
) -> Result<Vec<u8>, JobError> {
    job.begin(operation)?;
    let mut output = vec![0u8; capacity];
    loop {
        match job.execute(input, &mut output, ChunkFlags::SINGLE) {
            Ok(report) => {
                output.truncate(report.produced);
                return Ok(output);
            }
            Err(JobError::MoreOutputNeeded { required, available }) => {
                log::debug!("retrying with {} output bytes (had {})", required, available);
                output.resize(required, 0);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Compresses `source` in fixed, dynamic or Huffman-only dynamic mode.
pub fn compress_buffer(source: &[u8], options: &CompressOptions) -> Result<Compressed, JobError> {
    let mut settings = CompressSettings::new(options.flags);
    settings.level = options.level;
    compress_buffer_with(source, options.path, settings, Arc::new(EngineConfig::default()))
}

/// Compresses `source` with explicit settings, e.g. a canned table or a dictionary.
pub fn compress_buffer_with(
    source: &[u8],
    path: ExecutionPath,
    settings: CompressSettings<'_>,
    config: Arc<EngineConfig>,
) -> Result<Compressed, JobError> {
    let mut job = Job::with_config(path, config);
    let result = run_single(
        &mut job,
        Operation::Compress(settings),
        source,
        worst_case_compressed_size(source.len()) + 10,
    );
    let (last_bit_offset, crc32) = (job.last_bit_offset(), job.crc32());
    // The job is released on failure too.
    job.finalize()?;
    Ok(Compressed {
        bytes: result?,
        last_bit_offset,
        crc32,
    })
}

/// Decompresses a whole stream. `size_hint` is the first output capacity tried.
pub fn decompress_buffer(
    compressed: &[u8],
    options: &DecompressOptions,
    size_hint: usize,
) -> Result<Vec<u8>, JobError> {
    let settings =
        DecompressSettings::new(options.flags).with_ignore_bits(0, options.ignore_end_bits);
    decompress_buffer_with(compressed, options.path, settings, size_hint)
}

pub fn decompress_buffer_with(
    compressed: &[u8],
    path: ExecutionPath,
    settings: DecompressSettings<'_>,
    size_hint: usize,
) -> Result<Vec<u8>, JobError> {
    let mut job = Job::new(path);
    let result = run_single(&mut job, Operation::Decompress(settings), compressed, size_hint);
    job.finalize()?;
    result
}
