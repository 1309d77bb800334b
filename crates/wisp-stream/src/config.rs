//! Stream configuration

use std::path::Path;

use serde::Deserialize;
use wisp_core::{WispError, WispResult};

/// Where audience resolution and sink dispatch run relative to the
/// stream's exclusive lock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Inside the critical section. Dispatch order equals index order, and a
    /// slow membership lookup or sink blocks every operation on the stream.
    #[default]
    Locked,
    /// After releasing the lock, from a snapshot of the updated record.
    /// Dispatch order across subjects may differ from index order.
    Deferred,
}

/// Per-stream configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub dispatch: DispatchMode,
    /// Upper bound applied to every range query limit
    pub max_range_limit: Option<usize>,
}

impl StreamConfig {
    pub fn deferred() -> Self {
        StreamConfig {
            dispatch: DispatchMode::Deferred,
            ..StreamConfig::default()
        }
    }

    /// Limit for a range query after applying the configured cap
    pub fn effective_limit(&self, requested: Option<usize>) -> Option<usize> {
        match (requested, self.max_range_limit) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (requested, cap) => requested.or(cap),
        }
    }
}

/// Configuration for both streams
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WispConfig {
    pub presence: StreamConfig,
    pub typing: StreamConfig,
}

impl WispConfig {
    pub fn from_json_str(json: &str) -> WispResult<Self> {
        serde_json::from_str(json).map_err(|e| WispError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> WispResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WispError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}
