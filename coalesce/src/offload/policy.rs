use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to a background write that outlives its deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Run to completion.
    #[default]
    None,
    /// Abort once the duration has elapsed.
    Cancel(Duration),
    /// Keep running, but log once the duration has elapsed.
    Warn(Duration),
}

/// Limits of an [`OffloadManager`](super::OffloadManager).
///
/// ```yaml
/// max_concurrent_tasks: 1024   # null for no limit
/// deduplicate: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OffloadConfig {
    /// Writes in flight beyond this are dropped with a warning.
    pub max_concurrent_tasks: Option<usize>,
    /// Skip a keyed write while one for the same key is still running.
    pub deduplicate: bool,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: Some(1024),
            deduplicate: true,
        }
    }
}

impl OffloadConfig {
    /// Cap the number of writes in flight.
    pub fn max_concurrent_tasks(self, max: usize) -> Self {
        Self {
            max_concurrent_tasks: Some(max),
            ..self
        }
    }

    /// Remove the cap.
    pub fn unbounded(self) -> Self {
        Self {
            max_concurrent_tasks: None,
            ..self
        }
    }

    /// Turn keyed deduplication on or off.
    pub fn deduplicate(self, deduplicate: bool) -> Self {
        Self {
            deduplicate,
            ..self
        }
    }
}
