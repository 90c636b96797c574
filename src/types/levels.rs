//! Compression level enumerations and their capability queries.
//!
//! The job-wide `CompressionLevel` selects the match-search effort. The dictionary
//! builder takes a (`SoftwareLevel`, `HardwareLevel`) pair instead: one of the two
//! selects the engine the dictionary is prepared for, the other is `None`.

use serde::{Deserialize, Serialize};

use crate::types::ExecutionPath;

/// DEFLATE history window.
pub const DEFLATE_WINDOW: usize = 32 * 1024;
/// History the accelerator can reference.
pub const HARDWARE_HISTORY_LIMIT: usize = 4 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    #[default]
    Default,
    High,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 2] = [CompressionLevel::Default, CompressionLevel::High];

    /// The accelerator only implements the default level.
    pub fn is_supported_on(&self, path: ExecutionPath) -> bool {
        match (self, path) {
            (CompressionLevel::High, ExecutionPath::Hardware) => false,
            _ => true,
        }
    }
}

/// Software dictionary levels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SoftwareLevel {
    #[default]
    None,
    Level0,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
    Level6,
    Level7,
    Level8,
    Level9,
}

impl SoftwareLevel {
    pub const ALL: [SoftwareLevel; 10] = [
        SoftwareLevel::Level0,
        SoftwareLevel::Level1,
        SoftwareLevel::Level2,
        SoftwareLevel::Level3,
        SoftwareLevel::Level4,
        SoftwareLevel::Level5,
        SoftwareLevel::Level6,
        SoftwareLevel::Level7,
        SoftwareLevel::Level8,
        SoftwareLevel::Level9,
    ];

    pub fn is_none(&self) -> bool {
        *self == SoftwareLevel::None
    }

    pub fn index(&self) -> Option<u8> {
        Self::ALL.iter().position(|l| l == self).map(|i| i as u8)
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// History retained by a dictionary built at this level.
    pub fn window(&self) -> usize {
        if self.is_none() {
            0
        } else {
            DEFLATE_WINDOW
        }
    }

    /// Hash-chain depth used while a dictionary of this level is attached.
    pub fn chain_depth(&self) -> usize {
        match self.index() {
            None => 0,
            Some(i) => 4usize << i,
        }
    }
}

/// Hardware dictionary levels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HardwareLevel {
    #[default]
    None,
    Small,
    Large,
    Level1,
    Level2,
    Level3,
}

impl HardwareLevel {
    pub const ALL: [HardwareLevel; 5] = [
        HardwareLevel::Small,
        HardwareLevel::Large,
        HardwareLevel::Level1,
        HardwareLevel::Level2,
        HardwareLevel::Level3,
    ];

    pub fn is_none(&self) -> bool {
        *self == HardwareLevel::None
    }

    pub fn index(&self) -> Option<u8> {
        Self::ALL.iter().position(|l| l == self).map(|i| i as u8)
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn window(&self) -> usize {
        match self {
            HardwareLevel::None => 0,
            HardwareLevel::Small => HARDWARE_HISTORY_LIMIT / 2,
            _ => HARDWARE_HISTORY_LIMIT,
        }
    }
}
