//! Symbol statistics for table construction.

use crate::config::EngineConfig;
use crate::engine::{hardware, software};
use crate::error::JobError;
use crate::kernels::histogram::Histogram;
use crate::types::{CompressionLevel, ExecutionPath};

/// Counts the literal/length and distance symbols `path` would emit for `source` at
/// `level`. The result feeds `HuffmanTable::init_with_histogram`.
pub fn gather_deflate_statistics(
    source: &[u8],
    level: CompressionLevel,
    path: ExecutionPath,
    config: &EngineConfig,
) -> Result<Histogram, JobError> {
    if !level.is_supported_on(path) {
        return Err(JobError::Unsupported {
            feature: "high compression level",
            path,
        });
    }
    let effort = match path {
        ExecutionPath::Software => software::search_effort(config, level, None),
        ExecutionPath::Hardware => hardware::device_effort(config, None),
    };
    let histogram = Histogram::from_matches(source, effort);
    log_metric!(
        "event" = "gather_statistics",
        "path" = &path,
        "bytes" = &source.len()
    );
    Ok(histogram)
}

/// Byte counts of `source`, for Huffman-only tables.
pub fn gather_literal_statistics(source: &[u8]) -> Histogram {
    Histogram::from_literals(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_level_statistics_are_unsupported_on_hardware() {
        let config = EngineConfig::default();
        let err = gather_deflate_statistics(b"abc", CompressionLevel::High, ExecutionPath::Hardware, &config)
            .unwrap_err();
        assert!(matches!(err, JobError::Unsupported { .. }));
    }

    #[test]
    fn test_repetitive_source_yields_matches() {
        let config = EngineConfig::default();
        let source = b"abcabcabcabcabcabcabcabc".repeat(8);
        let histogram =
            gather_deflate_statistics(&source, CompressionLevel::Default, ExecutionPath::Software, &config)
                .unwrap();
        assert!(histogram.distances.iter().any(|&c| c > 0));
        assert_eq!(gather_literal_statistics(&source).literals()[b'a' as usize], 64);
    }
}
