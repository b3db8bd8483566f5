//! # Session Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Past this much playback, "previous" restarts the current track
    /// instead of moving back.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restart_threshold: default_restart_threshold(),
        }
    }
}

impl SessionConfig {
    pub fn with_restart_threshold(mut self, threshold: Duration) -> Self {
        self.restart_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.restart_threshold > Duration::from_secs(60) {
            return Err("restart_threshold must not exceed 60 seconds".to_string());
        }
        Ok(())
    }
}

fn default_restart_threshold() -> Duration {
    Duration::from_secs(3)
}
