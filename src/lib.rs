//! This file is the root of the `canned_deflate` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`job`, `table`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the types a caller needs to drive a job, so that
//!     `use canned_deflate::*` is enough for the common cases.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

#[doc(hidden)]
pub use log as __log;

pub mod bridge;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod job;
pub mod kernels;
pub mod table;
pub mod types;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use bridge::{compress_buffer, decompress_buffer, CompressOptions, DecompressOptions};
pub use config::EngineConfig;
pub use dictionary::Dictionary;
pub use engine::{Capabilities, ExecutionEngine};
pub use error::{ErrorCategory, JobError};
pub use job::{
    ChunkReport, ChunkSizes, CompressSettings, DecompressSettings, Job, JobPhase, Operation,
    StreamDriver,
};
pub use observability::init_logging;
pub use table::{HuffmanTable, TableKind, TableRepresentation};
pub use types::{ChunkFlags, CompressionLevel, ExecutionPath, HardwareLevel, JobFlags, SoftwareLevel};
