use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PARTITIONS: u32 = 3;
pub const MAX_FETCH_MSGS: usize = 5;
pub const MAX_FETCH_BYTES: usize = 1024;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_root: PathBuf,
    pub partitions: u32,
    pub max_fetch_msgs: usize,
    pub max_fetch_bytes: usize,
    /// Rewrite an index that disagrees with its log during recovery
    pub rebuild_index: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_root: "./data".into(),
            partitions: DEFAULT_PARTITIONS,
            max_fetch_msgs: MAX_FETCH_MSGS,
            max_fetch_bytes: MAX_FETCH_BYTES,
            rebuild_index: false,
        }
    }
}

impl StorageConfig {
    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            max_msgs: self.max_fetch_msgs,
            max_bytes: self.max_fetch_bytes,
        }
    }
}

/// Per-call caps of a fetch: record count and cumulative payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_msgs: usize,
    pub max_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        FetchLimits {
            max_msgs: MAX_FETCH_MSGS,
            max_bytes: MAX_FETCH_BYTES,
        }
    }
}
