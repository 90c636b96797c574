// In: src/table/mod.rs

//! The Huffman table manager.
//!
//! A `HuffmanTable` is a reusable, path-scoped code assignment. Canned mode and
//! static Huffman-only mode transmit no code description, so the decoder must use a
//! table that mirrors the encoder's exactly. The usual flow is:
//!
//!   1. `create` a compression (or combined) table for a path.
//!   2. Fill it from a `Histogram` (`init_with_histogram`) or from a job that generated
//!      codes itself (`Job::export_generated_table`).
//!   3. `create` a decompression table and copy the codes over with `init_with_other`.
//!   4. Use both with any number of jobs, then `destroy` them.
//!
//! Tables on the hardware path hold an accelerator table slot for their whole life.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AcceleratorConfig;
use crate::engine::accelerator::TableSlot;
use crate::engine::Accelerator;
use crate::error::{JobError, TableError};
use crate::kernels::deflate::{DeflateCodes, DeflateDecoders};
use crate::kernels::histogram::Histogram;
use crate::kernels::huffman::{CodeBook, HuffmanDecoder, MAX_CODE_BITS};
use crate::types::ExecutionPath;

mod statistics;

pub use statistics::{gather_deflate_statistics, gather_literal_statistics};

//==================================================================================
// 1. Table Descriptors
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Compression,
    Decompression,
    Combined,
}

impl TableKind {
    pub fn can_compress(&self) -> bool {
        matches!(self, TableKind::Compression | TableKind::Combined)
    }

    pub fn can_decompress(&self) -> bool {
        matches!(self, TableKind::Decompression | TableKind::Combined)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Compression => "compression",
            TableKind::Decompression => "decompression",
            TableKind::Combined => "combined",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableRepresentation {
    /// Literal/length and distance codes for canned and static DEFLATE blocks.
    Deflate,
    /// Literal codes only.
    HuffmanOnly,
}

impl TableRepresentation {
    pub fn name(&self) -> &'static str {
        match self {
            TableRepresentation::Deflate => "deflate",
            TableRepresentation::HuffmanOnly => "huffman-only",
        }
    }
}

/// Where a table's codes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    Empty,
    Histogram,
    Peer,
    GeneratedByJob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TableCodes {
    Deflate(Arc<DeflateCodes>),
    HuffmanOnly(Arc<CodeBook>),
}

impl TableCodes {
    fn representation(&self) -> TableRepresentation {
        match self {
            TableCodes::Deflate(_) => TableRepresentation::Deflate,
            TableCodes::HuffmanOnly(_) => TableRepresentation::HuffmanOnly,
        }
    }
}

#[derive(Debug, Clone)]
enum TableDecoders {
    Deflate(Arc<DeflateDecoders>),
    HuffmanOnly(Arc<HuffmanDecoder>),
}

//==================================================================================
// 2. The Table
//==================================================================================

pub struct HuffmanTable {
    kind: TableKind,
    representation: TableRepresentation,
    path: ExecutionPath,
    source: TableSource,
    codes: Option<TableCodes>,
    decoders: Option<TableDecoders>,
    slot: Option<TableSlot>,
}

impl fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuffmanTable")
            .field("kind", &self.kind)
            .field("representation", &self.representation)
            .field("path", &self.path)
            .field("source", &self.source)
            .field("slot", &self.slot.as_ref().map(TableSlot::id))
            .finish()
    }
}

impl HuffmanTable {
    /// Creates an empty table. Hardware tables reserve a slot on the shared accelerator.
    pub fn create(
        kind: TableKind,
        representation: TableRepresentation,
        path: ExecutionPath,
    ) -> Result<Self, JobError> {
        let accelerator = match path {
            ExecutionPath::Hardware => Some(Accelerator::shared(&AcceleratorConfig::default())),
            ExecutionPath::Software => None,
        };
        Self::build_shell(kind, representation, path, accelerator.as_ref())
    }

    /// Creates an empty table whose hardware slot comes from `accelerator`.
    pub fn create_on(
        kind: TableKind,
        representation: TableRepresentation,
        path: ExecutionPath,
        accelerator: &Arc<Accelerator>,
    ) -> Result<Self, JobError> {
        Self::build_shell(kind, representation, path, Some(accelerator))
    }

    fn build_shell(
        kind: TableKind,
        representation: TableRepresentation,
        path: ExecutionPath,
        accelerator: Option<&Arc<Accelerator>>,
    ) -> Result<Self, JobError> {
        let slot = match (path, accelerator) {
            (ExecutionPath::Hardware, Some(device)) => Some(device.reserve_table(kind, representation)?),
            _ => None,
        };
        log::debug!(
            "created {} {} table on {}",
            kind.name(),
            representation.name(),
            path
        );
        Ok(Self {
            kind,
            representation,
            path,
            source: TableSource::Empty,
            codes: None,
            decoders: None,
            slot,
        })
    }

    /// Fills a compression-capable table from symbol counts.
    ///
    /// Every symbol receives a code, so the table can encode any input, not only the
    /// data the counts were gathered over.
    pub fn init_with_histogram(&mut self, histogram: Histogram) -> Result<(), JobError> {
        if !self.kind.can_compress() {
            return Err(TableError::WrongKind {
                expected: "compression",
                actual: self.kind.name(),
            }
            .into());
        }
        if histogram.is_empty() {
            return Err(TableError::EmptyHistogram.into());
        }
        let codes = match self.representation {
            TableRepresentation::Deflate => {
                TableCodes::Deflate(Arc::new(DeflateCodes::complete_for_counts(&histogram)))
            }
            TableRepresentation::HuffmanOnly => {
                let freqs: Vec<u32> = histogram.literals().iter().map(|&c| c.max(1)).collect();
                TableCodes::HuffmanOnly(Arc::new(CodeBook::from_frequencies(&freqs, MAX_CODE_BITS)))
            }
        };
        self.install(codes, TableSource::Histogram)
    }

    /// Copies the codes of an initialized compression-capable table.
    pub fn init_with_other(&mut self, other: &HuffmanTable) -> Result<(), JobError> {
        if !self.kind.can_decompress() {
            return Err(TableError::WrongKind {
                expected: "decompression",
                actual: self.kind.name(),
            }
            .into());
        }
        if !other.kind.can_compress() {
            return Err(TableError::WrongKind {
                expected: "compression",
                actual: other.kind.name(),
            }
            .into());
        }
        if other.representation != self.representation {
            return Err(TableError::WrongRepresentation {
                expected: self.representation.name(),
                actual: other.representation.name(),
            }
            .into());
        }
        let codes = other.codes.clone().ok_or(TableError::Uninitialized)?;
        self.install(codes, TableSource::Peer)
    }

    /// Stores codes a job generated from its input.
    pub(crate) fn install_generated(&mut self, codes: TableCodes) -> Result<(), JobError> {
        if !self.kind.can_compress() {
            return Err(TableError::WrongKind {
                expected: "compression",
                actual: self.kind.name(),
            }
            .into());
        }
        self.install(codes, TableSource::GeneratedByJob)
    }

    fn install(&mut self, codes: TableCodes, source: TableSource) -> Result<(), JobError> {
        if codes.representation() != self.representation {
            return Err(TableError::WrongRepresentation {
                expected: self.representation.name(),
                actual: codes.representation().name(),
            }
            .into());
        }
        let decoders = if self.kind.can_decompress() {
            Some(match &codes {
                TableCodes::Deflate(c) => TableDecoders::Deflate(Arc::new(c.decoders()?)),
                TableCodes::HuffmanOnly(c) => TableDecoders::HuffmanOnly(Arc::new(c.decoder()?)),
            })
        } else {
            None
        };
        self.codes = Some(codes);
        self.decoders = decoders;
        self.source = source;
        log::debug!("initialized {} table from {:?}", self.kind.name(), source);
        Ok(())
    }

    /// Releases the table and its accelerator slot.
    pub fn destroy(self) -> Result<(), JobError> {
        log::debug!("destroying {} table on {}", self.kind.name(), self.path);
        drop(self);
        Ok(())
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn representation(&self) -> TableRepresentation {
        self.representation
    }

    pub fn path(&self) -> ExecutionPath {
        self.path
    }

    pub fn source(&self) -> TableSource {
        self.source
    }

    pub fn is_initialized(&self) -> bool {
        self.codes.is_some()
    }

    /// The accelerator slot held by a hardware table.
    pub fn slot_id(&self) -> Option<u64> {
        self.slot.as_ref().map(TableSlot::id)
    }

    //==============================================================================
    // Crate-internal code access
    //==============================================================================

    fn expect_representation(&self, wanted: TableRepresentation) -> Result<(), TableError> {
        if self.representation != wanted {
            return Err(TableError::WrongRepresentation {
                expected: wanted.name(),
                actual: self.representation.name(),
            });
        }
        Ok(())
    }

    fn expect_compression(&self, wanted: TableRepresentation) -> Result<&TableCodes, TableError> {
        if !self.kind.can_compress() {
            return Err(TableError::WrongKind {
                expected: "compression",
                actual: self.kind.name(),
            });
        }
        self.expect_representation(wanted)?;
        self.codes.as_ref().ok_or(TableError::Uninitialized)
    }

    fn expect_decompression(&self, wanted: TableRepresentation) -> Result<&TableDecoders, TableError> {
        if !self.kind.can_decompress() {
            return Err(TableError::WrongKind {
                expected: "decompression",
                actual: self.kind.name(),
            });
        }
        self.expect_representation(wanted)?;
        self.decoders.as_ref().ok_or(TableError::Uninitialized)
    }

    pub(crate) fn deflate_codes(&self) -> Result<Arc<DeflateCodes>, TableError> {
        match self.expect_compression(TableRepresentation::Deflate)? {
            TableCodes::Deflate(codes) => Ok(Arc::clone(codes)),
            TableCodes::HuffmanOnly(_) => Err(TableError::Uninitialized),
        }
    }

    pub(crate) fn literal_codes(&self) -> Result<Arc<CodeBook>, TableError> {
        match self.expect_compression(TableRepresentation::HuffmanOnly)? {
            TableCodes::HuffmanOnly(codes) => Ok(Arc::clone(codes)),
            TableCodes::Deflate(_) => Err(TableError::Uninitialized),
        }
    }

    pub(crate) fn deflate_decoders(&self) -> Result<Arc<DeflateDecoders>, TableError> {
        match self.expect_decompression(TableRepresentation::Deflate)? {
            TableDecoders::Deflate(d) => Ok(Arc::clone(d)),
            TableDecoders::HuffmanOnly(_) => Err(TableError::Uninitialized),
        }
    }

    pub(crate) fn literal_decoder(&self) -> Result<Arc<HuffmanDecoder>, TableError> {
        match self.expect_decompression(TableRepresentation::HuffmanOnly)? {
            TableDecoders::HuffmanOnly(d) => Ok(Arc::clone(d)),
            TableDecoders::Deflate(_) => Err(TableError::Uninitialized),
        }
    }
}

#[cfg(test)]
mod tests;
