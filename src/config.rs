// In: src/config.rs

//! The single source of truth for engine configuration.
//!
//! This module defines the unified `EngineConfig` struct, which is designed to be
//! created once at the application boundary (e.g., from a JSON file) and then passed
//! down to jobs and engines via a shared, read-only `Arc<EngineConfig>`.
//!
//! Per-stream choices (mode flags, tables, dictionaries) are not configuration; they
//! travel with each operation. The config holds the tunables of the engines
//! themselves: match-search effort, accelerator limits and logging.

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::types::CompressionLevel;

//==================================================================================
// I. Section Structs
//==================================================================================

/// Hash-chain search effort of the LZ77 match finder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MatchEffortConfig {
    /// Chain depth for `CompressionLevel::Default` on the software path.
    #[serde(default = "default_chain_depth")]
    pub default_chain: usize,

    /// Chain depth for `CompressionLevel::High`. High also enables lazy matching.
    #[serde(default = "high_chain_depth")]
    pub high_chain: usize,

    /// Fixed chain depth of the accelerator.
    #[serde(default = "hardware_chain_depth")]
    pub hardware_chain: usize,

    /// Stop searching once a match of this length is found.
    #[serde(default = "default_nice_length")]
    pub nice_length: usize,
}

impl Default for MatchEffortConfig {
    fn default() -> Self {
        Self {
            default_chain: default_chain_depth(),
            high_chain: high_chain_depth(),
            hardware_chain: hardware_chain_depth(),
            nice_length: default_nice_length(),
        }
    }
}

/// Limits of the emulated accelerator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AcceleratorConfig {
    /// Number of Huffman tables that can be resident at once.
    #[serde(default = "default_table_slots")]
    pub table_slots: usize,

    /// Number of submissions that may be in flight at once.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            table_slots: default_table_slots(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Defines settings for logging.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`. Defaults to `info`.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Append log records to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<String>,
}

//==================================================================================
// II. The Unified EngineConfig
//==================================================================================

/// The single, unified configuration of the engines.
/// This struct is created once and shared throughout the system via an `Arc`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Level used by operations that do not set one explicitly.
    #[serde(default)]
    pub default_level: CompressionLevel,

    #[serde(default)]
    pub match_effort: MatchEffortConfig,

    #[serde(default)]
    pub accelerator: AcceleratorConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn default_chain_depth() -> usize {
    32
}

fn high_chain_depth() -> usize {
    256
}

fn hardware_chain_depth() -> usize {
    8
}

fn default_nice_length() -> usize {
    128
}

fn default_table_slots() -> usize {
    256
}

fn default_queue_depth() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.match_effort.default_chain, 32);
        assert_eq!(config.accelerator.queue_depth, 32);
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let json = r#"{
            "default_level": "high",
            "accelerator": { "table_slots": 4 },
            "monitoring": { "log_level": "debug" }
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.default_level, CompressionLevel::High);
        assert_eq!(config.accelerator.table_slots, 4);
        assert_eq!(config.accelerator.queue_depth, default_queue_depth());
        assert_eq!(config.monitoring.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let err = EngineConfig::from_json_str("{ \"default_level\": 7 }").unwrap_err();
        assert!(matches!(err, JobError::Config(_)));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}
