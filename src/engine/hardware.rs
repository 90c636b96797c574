//! The hardware execution path.
//!
//! The accelerator is emulated: it runs the same kernels as the software path, but
//! within the device's limits. It searches a 4 KiB history with a fixed chain depth,
//! only offers the default level and rejects BE16 Huffman-only streams that end with
//! more than 7 bits of padding. Every chunk occupies one work queue entry while it runs.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::engine::{Accelerator, Capabilities, ExecutionEngine};
use crate::error::JobError;
use crate::job::ChunkOutcome;
use crate::kernels::lz77::MatchEffort;
use crate::types::levels::HARDWARE_HISTORY_LIMIT;
use crate::types::{CompressionLevel, ExecutionPath};

#[derive(Debug, Clone)]
pub struct HardwareEngine {
    config: Arc<EngineConfig>,
    accelerator: Arc<Accelerator>,
}

impl HardwareEngine {
    pub fn new(config: Arc<EngineConfig>, accelerator: Arc<Accelerator>) -> Self {
        Self { config, accelerator }
    }

    pub fn accelerator(&self) -> &Arc<Accelerator> {
        &self.accelerator
    }
}

impl ExecutionEngine for HardwareEngine {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Hardware
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_high_level: false,
            max_be16_ignore_end_bits: 7,
            history_limit: HARDWARE_HISTORY_LIMIT,
        }
    }

    fn match_effort(&self, _level: CompressionLevel, dictionary: Option<&Dictionary>) -> MatchEffort {
        device_effort(&self.config, dictionary)
    }

    fn submit(
        &self,
        work: &mut dyn FnMut() -> Result<ChunkOutcome, JobError>,
    ) -> Result<ChunkOutcome, JobError> {
        let _entry = self.accelerator.enqueue()?;
        log_metric!("event" = "hw_submit", "in_flight" = &self.accelerator.in_flight());
        work()
    }
}

/// The accelerator's fixed search: one chain depth, no lazy matching, and a history
/// bounded by the device (or by the attached dictionary's level).
pub fn device_effort(config: &EngineConfig, dictionary: Option<&Dictionary>) -> MatchEffort {
    let max_distance = dictionary
        .map(|d| d.hardware_level().window())
        .filter(|&w| w > 0)
        .unwrap_or(HARDWARE_HISTORY_LIMIT);
    MatchEffort {
        max_chain: config.match_effort.hardware_chain,
        nice_length: config.match_effort.nice_length,
        lazy: false,
        max_distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcceleratorConfig;

    fn engine(queue_depth: usize) -> HardwareEngine {
        let accelerator = Accelerator::new(AcceleratorConfig {
            table_slots: 4,
            queue_depth,
        });
        HardwareEngine::new(Arc::new(EngineConfig::default()), accelerator)
    }

    #[test]
    fn test_effort_is_bounded_by_device_history() {
        let engine = engine(1);
        let effort = engine.match_effort(CompressionLevel::Default, None);
        assert_eq!(effort.max_distance, HARDWARE_HISTORY_LIMIT);
        assert!(!effort.lazy);
    }

    #[test]
    fn test_submit_holds_a_queue_entry_while_running() {
        let engine = engine(1);
        let device = Arc::clone(engine.accelerator());
        let outcome = engine
            .submit(&mut || {
                assert_eq!(device.in_flight(), 1);
                Ok(ChunkOutcome::default())
            })
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::default());
        assert_eq!(engine.accelerator().in_flight(), 0);
    }

    #[test]
    fn test_nested_submit_on_a_full_queue_is_busy() {
        let engine = engine(1);
        let inner = engine.clone();
        let err = engine
            .submit(&mut || inner.submit(&mut || Ok(ChunkOutcome::default())))
            .unwrap_err();
        assert!(matches!(err, JobError::WorkQueueBusy { depth: 1 }));
    }
}
