// In: src/dictionary.rs

//! The preset dictionary builder.
//!
//! A dictionary is a flat blob: a fixed header followed by the history bytes that
//! seed the match finder (and the decoder's window). The caller sizes the blob with
//! `query_size` and then builds it with the same level pair. Exactly one of the two
//! levels is set; it selects the path the dictionary is prepared for and the window
//! of history retained.

use crate::bridge::format::{
    DICTIONARY_FORMAT_VERSION, DICTIONARY_HEADER_SIZE, DICTIONARY_LEVEL_NONE, DICTIONARY_MAGIC,
};
use crate::error::DictionaryError;
use crate::kernels::checksum::adler32;
use crate::types::{ExecutionPath, HardwareLevel, SoftwareLevel};

fn window(sw_level: SoftwareLevel, hw_level: HardwareLevel) -> usize {
    sw_level.window().max(hw_level.window())
}

/// Size of the blob `build` writes for these arguments.
pub fn query_size(sw_level: SoftwareLevel, hw_level: HardwareLevel, length: usize) -> usize {
    DICTIONARY_HEADER_SIZE + length.min(window(sw_level, hw_level))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    buffer: Vec<u8>,
    built: bool,
    software_level: SoftwareLevel,
    hardware_level: HardwareLevel,
    id: u32,
}

impl Dictionary {
    /// Allocates an unbuilt blob of `size` bytes, as returned by `query_size`.
    pub fn allocate(size: usize) -> Self {
        Self {
            buffer: vec![0; size],
            built: false,
            software_level: SoftwareLevel::None,
            hardware_level: HardwareLevel::None,
            id: 0,
        }
    }

    /// Builds the dictionary from `source[..length]`, keeping its tail up to the
    /// level's window. Rebuilding with the same arguments yields the same blob.
    pub fn build(
        &mut self,
        sw_level: SoftwareLevel,
        hw_level: HardwareLevel,
        source: &[u8],
        length: usize,
    ) -> Result<(), DictionaryError> {
        if sw_level.is_none() == hw_level.is_none() {
            return Err(DictionaryError::InvalidLevels);
        }
        if length > source.len() {
            return Err(DictionaryError::LengthExceedsSource {
                length,
                source_len: source.len(),
            });
        }
        let expected = query_size(sw_level, hw_level, length);
        if self.buffer.len() != expected {
            return Err(DictionaryError::BufferSizeMismatch {
                expected,
                actual: self.buffer.len(),
            });
        }

        let kept = length.min(window(sw_level, hw_level));
        let history = &source[length - kept..length];
        let id = adler32(history);

        let header = &mut self.buffer[..DICTIONARY_HEADER_SIZE];
        header[..4].copy_from_slice(DICTIONARY_MAGIC);
        header[4] = DICTIONARY_FORMAT_VERSION;
        header[5] = sw_level.index().unwrap_or(DICTIONARY_LEVEL_NONE);
        header[6] = hw_level.index().unwrap_or(DICTIONARY_LEVEL_NONE);
        header[7] = 0;
        header[8..12].copy_from_slice(&(kept as u32).to_le_bytes());
        header[12..16].copy_from_slice(&id.to_le_bytes());
        self.buffer[DICTIONARY_HEADER_SIZE..].copy_from_slice(history);

        self.software_level = sw_level;
        self.hardware_level = hw_level;
        self.id = id;
        self.built = true;
        log::debug!(
            "built dictionary {:#010x}: {} of {} bytes kept ({:?}/{:?})",
            id,
            kept,
            length,
            sw_level,
            hw_level
        );
        Ok(())
    }

    /// Parses a blob previously produced by `build`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DictionaryError> {
        if bytes.len() < DICTIONARY_HEADER_SIZE
            || &bytes[..4] != DICTIONARY_MAGIC
            || bytes[4] != DICTIONARY_FORMAT_VERSION
        {
            return Err(DictionaryError::NotBuilt);
        }
        let level = |b: u8| (b != DICTIONARY_LEVEL_NONE).then_some(b);
        let software_level = match level(bytes[5]) {
            Some(i) => SoftwareLevel::from_index(i).ok_or(DictionaryError::InvalidLevels)?,
            None => SoftwareLevel::None,
        };
        let hardware_level = match level(bytes[6]) {
            Some(i) => HardwareLevel::from_index(i).ok_or(DictionaryError::InvalidLevels)?,
            None => HardwareLevel::None,
        };
        if software_level.is_none() == hardware_level.is_none() {
            return Err(DictionaryError::InvalidLevels);
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[8..12]);
        let kept = u32::from_le_bytes(word) as usize;
        word.copy_from_slice(&bytes[12..16]);
        let id = u32::from_le_bytes(word);
        let expected = DICTIONARY_HEADER_SIZE + kept;
        if bytes.len() != expected {
            return Err(DictionaryError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            buffer: bytes.to_vec(),
            built: true,
            software_level,
            hardware_level,
            id,
        })
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The retained history bytes.
    pub fn history(&self) -> &[u8] {
        if self.built {
            &self.buffer[DICTIONARY_HEADER_SIZE..]
        } else {
            &[]
        }
    }

    /// Adler-32 of the history, as announced by a zlib `FDICT` header.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn software_level(&self) -> SoftwareLevel {
        self.software_level
    }

    pub fn hardware_level(&self) -> HardwareLevel {
        self.hardware_level
    }

    /// The path whose compressor this dictionary was prepared for.
    pub fn built_for(&self) -> Result<ExecutionPath, DictionaryError> {
        if !self.built {
            return Err(DictionaryError::NotBuilt);
        }
        Ok(if self.software_level.is_none() {
            ExecutionPath::Hardware
        } else {
            ExecutionPath::Software
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_source(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random()).collect()
    }

    fn built(sw: SoftwareLevel, hw: HardwareLevel, source: &[u8], length: usize) -> Dictionary {
        let mut dictionary = Dictionary::allocate(query_size(sw, hw, length));
        dictionary.build(sw, hw, source, length).unwrap();
        dictionary
    }

    #[test]
    fn test_query_size_caps_history_by_window() {
        assert_eq!(
            query_size(SoftwareLevel::Level1, HardwareLevel::None, 100),
            DICTIONARY_HEADER_SIZE + 100
        );
        assert_eq!(
            query_size(SoftwareLevel::None, HardwareLevel::Small, 10_000),
            DICTIONARY_HEADER_SIZE + 2048
        );
        assert_eq!(
            query_size(SoftwareLevel::None, HardwareLevel::Level2, 10_000),
            DICTIONARY_HEADER_SIZE + 4096
        );
        assert_eq!(
            query_size(SoftwareLevel::Level9, HardwareLevel::None, 100_000),
            DICTIONARY_HEADER_SIZE + 32 * 1024
        );
    }

    #[test]
    fn test_build_keeps_the_tail_and_is_deterministic() {
        let source = random_source(5000, 7);
        let a = built(SoftwareLevel::None, HardwareLevel::Small, &source, 3000);
        let b = built(SoftwareLevel::None, HardwareLevel::Small, &source, 3000);
        assert_eq!(a, b);
        // Small keeps half of the device history.
        assert_eq!(a.history(), &source[3000 - 2048..3000]);
        assert_eq!(a.id(), adler32(&source[3000 - 2048..3000]));
        assert_eq!(a.built_for().unwrap(), ExecutionPath::Hardware);
    }

    #[test]
    fn test_build_rejects_bad_arguments() {
        let source = random_source(64, 1);
        let mut dictionary =
            Dictionary::allocate(query_size(SoftwareLevel::Level3, HardwareLevel::None, 32));
        assert_eq!(
            dictionary.build(SoftwareLevel::Level3, HardwareLevel::None, &source, 65),
            Err(DictionaryError::LengthExceedsSource {
                length: 65,
                source_len: 64
            })
        );
        assert_eq!(
            dictionary.build(SoftwareLevel::Level3, HardwareLevel::None, &source, 31),
            Err(DictionaryError::BufferSizeMismatch {
                expected: DICTIONARY_HEADER_SIZE + 31,
                actual: DICTIONARY_HEADER_SIZE + 32
            })
        );
        assert_eq!(
            dictionary.build(SoftwareLevel::Level3, HardwareLevel::Large, &source, 32),
            Err(DictionaryError::InvalidLevels)
        );
        assert_eq!(dictionary.built_for(), Err(DictionaryError::NotBuilt));
    }

    #[test]
    fn test_blob_parses_back() {
        let source = random_source(300, 3);
        let original = built(SoftwareLevel::Level5, HardwareLevel::None, &source, 300);
        let parsed = Dictionary::from_bytes(original.as_bytes()).unwrap();
        assert_eq!(parsed, original);
        assert!(Dictionary::from_bytes(&original.as_bytes()[..10]).is_err());
    }
}
