// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Execution Path Abstraction
// ====================================================================================
//
// A job is bound to one `ExecutionEngine` for its whole life. Both engines drive the
// same codec kernels; they differ in what they accept and how work is submitted:
//
//   1. [Capability checks]   -> `check_compress` / `check_decompress`, run on FIRST.
//                               Limits of the path surface as named errors
//                               (`Unsupported`, `HuffmanBeIgnoreMoreThan7Bits`).
//
//   2. [Stream parameters]   -> `match_effort` and `capabilities()` shape the
//                               carried stream state (search depth, history reach,
//                               verify limits).
//
//   3. [Submission]          -> `submit` runs one chunk. The software engine runs it
//                               inline; the hardware engine claims a queue entry on
//                               the accelerator first.
//
// ====================================================================================

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::error::{JobError, ProtocolError, TableError};
use crate::job::{ChunkOutcome, CompressSettings, DecompressSettings};
use crate::kernels::lz77::MatchEffort;
use crate::table::HuffmanTable;
use crate::types::{CompressionLevel, ExecutionPath, JobFlags};

pub mod accelerator;
pub mod hardware;
pub mod software;

pub use accelerator::Accelerator;
pub use hardware::HardwareEngine;
pub use software::SoftwareEngine;

/// What an execution path can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_high_level: bool,
    /// Largest `ignore_end_bits` accepted when decoding BE16 Huffman-only data.
    pub max_be16_ignore_end_bits: u8,
    /// Farthest back-reference the compressor emits.
    pub history_limit: usize,
}

pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    fn path(&self) -> ExecutionPath;

    fn capabilities(&self) -> Capabilities;

    /// Search parameters for a stream at `level`, optionally with a dictionary attached.
    fn match_effort(&self, level: CompressionLevel, dictionary: Option<&Dictionary>) -> MatchEffort;

    /// Runs one chunk of work.
    fn submit(
        &self,
        work: &mut dyn FnMut() -> Result<ChunkOutcome, JobError>,
    ) -> Result<ChunkOutcome, JobError>;

    fn check_compress(
        &self,
        settings: &CompressSettings<'_>,
        level: CompressionLevel,
    ) -> Result<(), JobError> {
        if level == CompressionLevel::High && !self.capabilities().supports_high_level {
            return Err(JobError::Unsupported {
                feature: "high compression level",
                path: self.path(),
            });
        }
        if let Some(dictionary) = settings.dictionary {
            let built_for = dictionary.built_for()?;
            if built_for != self.path() {
                return Err(crate::error::DictionaryError::PathMismatch {
                    built_for,
                    job: self.path(),
                }
                .into());
            }
        }
        check_table_path(settings.huffman_table, self.path())
    }

    fn check_decompress(&self, settings: &DecompressSettings<'_>) -> Result<(), JobError> {
        if settings.ignore_start_bits > 7 {
            return Err(ProtocolError::InvalidFlags(format!(
                "ignore_start_bits {} exceeds one byte",
                settings.ignore_start_bits
            ))
            .into());
        }
        let be16 = settings.flags.is_huffman_only() && settings.flags.contains(JobFlags::HUFFMAN_BE);
        if be16 {
            if settings.ignore_end_bits > 15 {
                return Err(ProtocolError::InvalidFlags(format!(
                    "ignore_end_bits {} exceeds one 16-bit word",
                    settings.ignore_end_bits
                ))
                .into());
            }
            if settings.ignore_end_bits > self.capabilities().max_be16_ignore_end_bits {
                return Err(JobError::HuffmanBeIgnoreMoreThan7Bits {
                    ignore_end_bits: settings.ignore_end_bits,
                    path: self.path(),
                });
            }
        } else if settings.ignore_end_bits > 7 {
            return Err(ProtocolError::InvalidFlags(format!(
                "ignore_end_bits {} exceeds one byte",
                settings.ignore_end_bits
            ))
            .into());
        }
        check_table_path(settings.huffman_table, self.path())
    }
}

fn check_table_path(table: Option<&HuffmanTable>, path: ExecutionPath) -> Result<(), JobError> {
    match table {
        Some(t) if t.path() != path => Err(TableError::PathMismatch {
            table: t.path(),
            job: path,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Creates the engine for `path`. The hardware engine attaches to the shared accelerator.
pub fn for_path(path: ExecutionPath, config: Arc<EngineConfig>) -> Box<dyn ExecutionEngine> {
    match path {
        ExecutionPath::Software => Box::new(SoftwareEngine::new(config)),
        ExecutionPath::Hardware => {
            let accelerator = Accelerator::shared(&config.accelerator);
            Box::new(HardwareEngine::new(config, accelerator))
        }
    }
}
