//! The execution path selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where the work of a job is performed.
///
/// Tables and jobs are bound to one path at creation. The same request may succeed on
/// one path and fail with a capability error on the other.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Portable software engine.
    #[default]
    Software,
    /// Accelerator engine, with the capability limits of the device.
    Hardware,
}

impl ExecutionPath {
    pub const ALL: [ExecutionPath; 2] = [ExecutionPath::Software, ExecutionPath::Hardware];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPath::Software => "software_path",
            ExecutionPath::Hardware => "hardware_path",
        }
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPath {
    type Err = String;

    /// Accepts the command-line spellings `software_path` / `hardware_path` as well as
    /// the short forms `software` / `hardware`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software_path" | "software" | "sw" => Ok(ExecutionPath::Software),
            "hardware_path" | "hardware" | "hw" => Ok(ExecutionPath::Hardware),
            other => Err(format!(
                "unknown execution path '{}'; use either hardware_path or software_path",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line_spellings() {
        assert_eq!(
            "hardware_path".parse::<ExecutionPath>().unwrap(),
            ExecutionPath::Hardware
        );
        assert_eq!(
            "software_path".parse::<ExecutionPath>().unwrap(),
            ExecutionPath::Software
        );
        assert!("auto_path".parse::<ExecutionPath>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for path in ExecutionPath::ALL {
            assert_eq!(path.to_string().parse::<ExecutionPath>().unwrap(), path);
        }
    }
}
