//! Speech output configuration.
//!
//! Configuration is plain YAML, e.g.:
//!
//! ```yaml
//! queue_capacity: 32
//! ```

use crate::error::ConfigError;
use crate::queue::MIN_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default capacity of each synthesis queue, in entries.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for [`SpeechOutput`](crate::SpeechOutput).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Capacity of each synthesis queue. Synthesis suspends when the playout
    /// falls this many entries behind. Values below 2 are raised to 2.
    pub queue_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl OutputConfig {
    /// Parses a configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub(crate) fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(MIN_QUEUE_CAPACITY)
    }
}
