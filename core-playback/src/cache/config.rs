//! Download orchestrator configuration

use core_runtime::config::{DownloadSettings, DEFAULT_SKIPPED_COVER_HOSTS};
use std::time::Duration;

/// Configuration for the download orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Number of different tracks allowed to download at once (default: 1)
    pub max_concurrent_downloads: usize,

    /// Upper bound on a single audio transfer (default: 300s)
    pub download_timeout: Duration,

    /// Covers whose URL mentions one of these hosts are never fetched
    pub skipped_cover_hosts: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 1,
            download_timeout: Duration::from_secs(300),
            skipped_cover_hosts: DEFAULT_SKIPPED_COVER_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_skipped_cover_hosts(mut self, hosts: Vec<String>) -> Self {
        self.skipped_cover_hosts = hosts;
        self
    }

    /// Whether a cover at `url` should be downloaded at all.
    pub fn should_fetch_cover(&self, url: &str) -> bool {
        !url.trim().is_empty()
            && !self
                .skipped_cover_hosts
                .iter()
                .any(|host| url.contains(host.as_str()))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than zero".to_string());
        }

        Ok(())
    }
}

impl From<&DownloadSettings> for DownloadConfig {
    fn from(settings: &DownloadSettings) -> Self {
        Self {
            max_concurrent_downloads: settings.max_concurrent_downloads,
            download_timeout: settings.download_timeout,
            skipped_cover_hosts: settings.skipped_cover_hosts.clone(),
        }
    }
}
