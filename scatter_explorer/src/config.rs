use std::{fs, io, path::Path};

use scatter_inputs::Frame;
use serde::{Deserialize, Serialize};

/// All tunables for a scattershot run (§6).
///
/// Loaded from a JSON file by the CLI, the way `wafel_layout`'s config types are: a
/// plain `serde`-derived struct plus a `load` convenience and a `Default` seeded with
/// reasonable (if much smaller) values than the ones `bitfs-turnaround/src/main.cpp`'s
/// `InitConfiguration` hardcodes for a multi-day search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    /// First frame at which exploration begins.
    pub start_frame: Frame,
    /// Frames per mutation segment.
    pub segment_length: u16,
    /// Soft cap on segment chain depth.
    pub max_segments: u32,
    /// Per-thread block capacity.
    pub max_blocks: usize,
    /// Per-thread hash table size. Should be at least 10x `max_blocks`.
    pub max_hashes: usize,
    /// Shared block capacity.
    pub max_shared_blocks: usize,
    /// Shared hash table size.
    pub max_shared_hashes: usize,
    /// Shared segment arena size.
    pub max_shared_segments: usize,
    /// Per-thread segment arena size.
    pub max_local_segments: usize,
    /// Cap on total segment-chain length replayed per shot.
    pub max_lightning_length: u32,
    /// Worker thread count.
    pub total_threads: usize,
    /// Termination bound: total shots taken across all threads' loops.
    pub max_shots: u64,
    /// Stride (in frames) at which a shot's segment offers insertion candidates.
    pub segments_per_shot: u32,
    /// Shots between merge barriers.
    pub shots_per_merge: u64,
    /// Merges between segment GC passes.
    pub merges_per_segment_gc: u64,
    /// Denominator of the probability of sampling the root instead of a shared block.
    pub start_from_root_every_n_shots: u64,
    /// Path to the initial input track.
    pub m64_path: String,
    /// One simulator binary path per worker thread.
    pub resource_paths: Vec<String>,
}

/// Failures loading a [`Configuration`] from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// The file couldn't be read.
    Io(io::Error),
    /// The file's JSON didn't match [`Configuration`]'s shape.
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read configuration: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(v: io::Error) -> Self {
        Self::Io(v)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(v: serde_json::Error) -> Self {
        Self::Parse(v)
    }
}

impl Configuration {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// As the original's `Configuration::SetResourcePaths` template helper: set
    /// `resource_paths` from any iterable of path-like items.
    pub fn with_resource_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resource_paths = paths.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for Configuration {
    /// Scaled-down defaults in the spirit of `bitfs-turnaround/src/main.cpp`'s
    /// `InitConfiguration` (which targets a multi-day, multi-billion-shot search);
    /// these are sized for a short local run.
    fn default() -> Self {
        Self {
            start_frame: 0,
            segment_length: 10,
            max_segments: 1024,
            max_blocks: 50_000,
            max_hashes: 500_000,
            max_shared_blocks: 200_000,
            max_shared_hashes: 2_000_000,
            max_shared_segments: 500_000,
            max_local_segments: 50_000,
            max_lightning_length: 10_000,
            total_threads: 4,
            max_shots: 10_000,
            segments_per_shot: 20,
            shots_per_merge: 50,
            merges_per_segment_gc: 10,
            start_from_root_every_n_shots: 5,
            m64_path: "input.trk".to_string(),
            resource_paths: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_resource_paths_sets_one_path_per_thread() {
        let config = Configuration::default().with_resource_paths(["a.dll", "b.dll"]);
        assert_eq!(config.resource_paths, vec!["a.dll".to_string(), "b.dll".to_string()]);
    }

    #[test]
    fn round_trips_through_json() {
        let config = Configuration::default().with_resource_paths(["a.dll"]);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_threads, config.total_threads);
        assert_eq!(parsed.resource_paths, config.resource_paths);
    }
}
