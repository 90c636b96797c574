// In: src/error.rs

//! This module defines the single, unified error type for the entire canned-deflate library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every failure a job can report is a variant of `JobError`. The variants are grouped
//! into categories (`ErrorCategory`) so that callers can tell a capacity problem
//! (retry with a bigger buffer) from a protocol misuse or a capability boundary of the
//! selected execution path.

use thiserror::Error;

use crate::types::ExecutionPath;

//==================================================================================
// 1. Status Taxonomy
//==================================================================================

/// Stable status codes, one per observable job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    MoreOutputNeeded,
    AllocationError,
    WorkQueueBusy,
    ProtocolError,
    Unsupported,
    HuffmanBeIgnoreMoreThan7BitsError,
    VerifyError,
    TableError,
    DictionaryError,
    NeedDictionary,
    InvalidDeflateData,
    ConfigError,
}

/// Coarse grouping of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A table slot or queue entry could not be reserved.
    Resource,
    /// The destination buffer is too small. The call may be retried.
    Capacity,
    /// The caller broke the FIRST/LAST protocol or misused an object.
    Protocol,
    /// The selected execution path cannot perform the request.
    CapabilityBoundary,
    /// The verify pass disagreed with the input.
    Verification,
    /// The compressed stream is malformed.
    Data,
}

//==================================================================================
// 2. Nested Error Kinds
//==================================================================================

/// Violations of the FIRST/LAST chunk protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("no operation has been armed with `begin`")]
    NoOperation,

    #[error("the first chunk of a stream must carry the FIRST flag")]
    MissingFirst,

    #[error("FIRST was set on a chunk while the stream already carries state")]
    FirstWithCarriedState,

    #[error("the stream already received its LAST chunk; re-initialize the job first")]
    StreamFinished,

    #[error("an operation can only be armed on a job in the Ready state")]
    BeginWhileStreaming,

    #[error("invalid flag combination: {0}")]
    InvalidFlags(String),
}

/// Misuse of a Huffman table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("the table has not been initialized")]
    Uninitialized,

    #[error("a {expected} table is required, but a {actual} table was supplied")]
    WrongKind {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("a {expected} table is required, but a {actual} table was supplied")]
    WrongRepresentation {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("the table belongs to the {table:?} path but the job runs on {job:?}")]
    PathMismatch {
        table: ExecutionPath,
        job: ExecutionPath,
    },

    #[error("the histogram contains no symbols")]
    EmptyHistogram,

    #[error("the operation requires a Huffman table")]
    Missing,

    #[error("symbol {0} has no code in the supplied table")]
    SymbolNotCoded(u16),
}

/// Failures of the dictionary builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("requested dictionary length {length} exceeds the source length {source_len}")]
    LengthExceedsSource { length: usize, source_len: usize },

    #[error("dictionary buffer holds {actual} bytes but the query for these arguments returned {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("exactly one of the software and hardware levels must be set")]
    InvalidLevels,

    #[error("the dictionary has not been built")]
    NotBuilt,

    #[error("a dictionary built for {built_for:?} cannot drive compression on {job:?}")]
    PathMismatch {
        built_for: ExecutionPath,
        job: ExecutionPath,
    },
}

/// Malformed or inconsistent compressed data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("reserved block type 3")]
    ReservedBlockType,

    #[error("stored block length {len:#06x} does not match its complement {nlen:#06x}")]
    StoredLengthMismatch { len: u16, nlen: u16 },

    #[error("invalid Huffman code lengths: {0}")]
    InvalidCodeLengths(&'static str),

    #[error("bit pattern does not map to any symbol")]
    InvalidSymbol,

    #[error("back-reference distance {distance} reaches before the start of the history ({available} bytes)")]
    DistanceTooFar { distance: usize, available: usize },

    #[error("the stream ended before its final block was complete")]
    TruncatedStream,

    #[error("bad zlib header: {0}")]
    BadZlibHeader(&'static str),

    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

//==================================================================================
// 3. The Unified Error
//==================================================================================

#[derive(Error, Debug)]
pub enum JobError {
    // =========================================================================
    // === Capacity and Resource Errors
    // =========================================================================
    #[error("more output space needed: {required} bytes required, {available} available")]
    MoreOutputNeeded { required: usize, available: usize },

    #[error("could not reserve {what} on the {path:?} path")]
    Allocation { what: &'static str, path: ExecutionPath },

    #[error("the accelerator work queue is full ({depth} entries in flight)")]
    WorkQueueBusy { depth: usize },

    // =========================================================================
    // === Protocol and Capability Errors
    // =========================================================================
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unsupported on the {path:?} path: {feature}")]
    Unsupported {
        feature: &'static str,
        path: ExecutionPath,
    },

    #[error("big-endian Huffman-only decoding cannot ignore {ignore_end_bits} trailing bits on the {path:?} path (at most 7)")]
    HuffmanBeIgnoreMoreThan7Bits {
        ignore_end_bits: u8,
        path: ExecutionPath,
    },

    // =========================================================================
    // === Object-Specific Errors
    // =========================================================================
    #[error("Huffman table error: {0}")]
    Table(#[from] TableError),

    #[error("dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),

    #[error("stream requires a preset dictionary with id {expected:#010x}")]
    NeedDictionary { expected: u32 },

    // =========================================================================
    // === Verification and Data Errors
    // =========================================================================
    #[error("verification failed: {0}")]
    Verification(String),

    #[error("invalid compressed data: {0}")]
    Data(#[from] DataError),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from the Serde JSON library, typically while loading an `EngineConfig`.
    #[error("Serde JSON error: {0}")]
    Config(#[from] serde_json::Error),
}

impl JobError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::MoreOutputNeeded { .. } => ErrorCategory::Capacity,
            JobError::Allocation { .. } | JobError::WorkQueueBusy { .. } => {
                ErrorCategory::Resource
            }
            JobError::Protocol(_)
            | JobError::Table(_)
            | JobError::Dictionary(_)
            | JobError::Config(_) => ErrorCategory::Protocol,
            JobError::Unsupported { .. } | JobError::HuffmanBeIgnoreMoreThan7Bits { .. } => {
                ErrorCategory::CapabilityBoundary
            }
            JobError::Verification(_) => ErrorCategory::Verification,
            JobError::NeedDictionary { .. } | JobError::Data(_) => ErrorCategory::Data,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            JobError::MoreOutputNeeded { .. } => Status::MoreOutputNeeded,
            JobError::Allocation { .. } => Status::AllocationError,
            JobError::WorkQueueBusy { .. } => Status::WorkQueueBusy,
            JobError::Protocol(_) => Status::ProtocolError,
            JobError::Unsupported { .. } => Status::Unsupported,
            JobError::HuffmanBeIgnoreMoreThan7Bits { .. } => {
                Status::HuffmanBeIgnoreMoreThan7BitsError
            }
            JobError::Table(_) => Status::TableError,
            JobError::Dictionary(_) => Status::DictionaryError,
            JobError::NeedDictionary { .. } => Status::NeedDictionary,
            JobError::Verification(_) => Status::VerifyError,
            JobError::Data(_) => Status::InvalidDeflateData,
            JobError::Config(_) => Status::ConfigError,
        }
    }

    /// True when the same chunk can be resubmitted with a larger destination.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Capacity
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
