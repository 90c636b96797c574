//! The software execution path: runs every chunk inline on the calling thread.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::engine::{Capabilities, ExecutionEngine};
use crate::error::JobError;
use crate::job::ChunkOutcome;
use crate::kernels::lz77::MatchEffort;
use crate::types::levels::DEFLATE_WINDOW;
use crate::types::{CompressionLevel, ExecutionPath};

#[derive(Debug, Clone)]
pub struct SoftwareEngine {
    config: Arc<EngineConfig>,
}

impl SoftwareEngine {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }
}

impl ExecutionEngine for SoftwareEngine {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Software
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_high_level: true,
            max_be16_ignore_end_bits: 15,
            history_limit: DEFLATE_WINDOW,
        }
    }

    fn match_effort(&self, level: CompressionLevel, dictionary: Option<&Dictionary>) -> MatchEffort {
        search_effort(&self.config, level, dictionary)
    }

    fn submit(
        &self,
        work: &mut dyn FnMut() -> Result<ChunkOutcome, JobError>,
    ) -> Result<ChunkOutcome, JobError> {
        work()
    }
}

/// Match-search parameters of the software path.
pub fn search_effort(
    config: &EngineConfig,
    level: CompressionLevel,
    dictionary: Option<&Dictionary>,
) -> MatchEffort {
    let tuning = &config.match_effort;
    let mut effort = match level {
        CompressionLevel::Default => MatchEffort {
            max_chain: tuning.default_chain,
            nice_length: tuning.nice_length,
            lazy: false,
            max_distance: DEFLATE_WINDOW,
        },
        CompressionLevel::High => MatchEffort {
            max_chain: tuning.high_chain,
            nice_length: tuning.nice_length,
            lazy: true,
            max_distance: DEFLATE_WINDOW,
        },
    };
    // A dictionary carries the search depth it was prepared for.
    if let Some(depth) = dictionary
        .map(|d| d.software_level().chain_depth())
        .filter(|&depth| depth > 0)
    {
        effort.max_chain = depth;
    }
    effort
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SoftwareLevel;

    #[test]
    fn test_high_level_searches_deeper_and_lazily() {
        let engine = SoftwareEngine::new(Arc::new(EngineConfig::default()));
        let default = engine.match_effort(CompressionLevel::Default, None);
        let high = engine.match_effort(CompressionLevel::High, None);
        assert!(high.max_chain > default.max_chain);
        assert!(high.lazy && !default.lazy);
        assert_eq!(default.max_distance, DEFLATE_WINDOW);
    }

    #[test]
    fn test_dictionary_level_sets_chain_depth() {
        let engine = SoftwareEngine::new(Arc::new(EngineConfig::default()));
        let source = vec![7u8; 64];
        let mut dictionary = Dictionary::allocate(crate::dictionary::query_size(
            SoftwareLevel::Level2,
            crate::types::HardwareLevel::None,
            source.len(),
        ));
        dictionary
            .build(SoftwareLevel::Level2, crate::types::HardwareLevel::None, &source, source.len())
            .unwrap();
        let effort = engine.match_effort(CompressionLevel::Default, Some(&dictionary));
        assert_eq!(effort.max_chain, SoftwareLevel::Level2.chain_depth());
    }
}
