use std::{fs, io, path::Path};

use scatter_explorer::Configuration;
use serde::{Deserialize, Serialize};

/// Top-level CLI configuration file: the core [`Configuration`] (§6) plus the handful
/// of extra keys the CLI's built-in [`crate::policy::RawMemoryPolicy`] needs, since
/// projection/fitness/mutation are policies the core takes no position on (§1, §2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CliConfig {
    /// Every key from §6's Configuration table.
    #[serde(flatten)]
    pub explorer: Configuration,
    /// Exported symbol the built-in policy reads the state projection from.
    pub projection_symbol: String,
    /// Byte offset within that symbol's memory the projection is copied from.
    pub projection_offset: usize,
    /// Exported symbol the built-in policy reads fitness from.
    pub fitness_symbol: String,
    /// Byte offset within that symbol's memory fitness (an `f32`) is read from.
    pub fitness_offset: usize,
    /// Button bitmask the built-in policy's mutation is allowed to set.
    pub allowed_buttons: u16,
}

/// Failures loading a [`CliConfig`] from disk.
#[derive(Debug)]
pub enum CliConfigError {
    /// The file couldn't be read.
    Io(io::Error),
    /// The file's JSON didn't match [`CliConfig`]'s shape.
    Parse(serde_json::Error),
}

impl std::fmt::Display for CliConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliConfigError::Io(e) => write!(f, "failed to read configuration: {e}"),
            CliConfigError::Parse(e) => write!(f, "failed to parse configuration: {e}"),
        }
    }
}

impl std::error::Error for CliConfigError {}

impl From<io::Error> for CliConfigError {
    fn from(v: io::Error) -> Self {
        Self::Io(v)
    }
}

impl From<serde_json::Error> for CliConfigError {
    fn from(v: serde_json::Error) -> Self {
        Self::Parse(v)
    }
}

impl CliConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CliConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let config = CliConfig {
            explorer: Configuration::default().with_resource_paths(["a.dll"]),
            projection_symbol: "gMarioState".to_string(),
            projection_offset: 0,
            fitness_symbol: "gMarioState".to_string(),
            fitness_offset: 4,
            allowed_buttons: 0xFFFF,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CliConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.projection_symbol, config.projection_symbol);
        assert_eq!(parsed.explorer.total_threads, config.explorer.total_threads);
    }
}
