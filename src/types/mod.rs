//! This module defines the core, strongly-typed vocabulary shared by every layer of
//! the library: the execution path a job or table is bound to, the compression level
//! enumerations with their capability queries, and the flag sets carried by jobs and
//! chunks.

pub mod execution_path;
pub mod flags;
pub mod levels;

// Re-export the main type(s) for easier access.
pub use execution_path::ExecutionPath;
pub use flags::{ChunkFlags, JobFlags};
pub use levels::{CompressionLevel, HardwareLevel, SoftwareLevel};
