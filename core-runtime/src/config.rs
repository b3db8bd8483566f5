//! # Core Configuration Module
//!
//! Configuration for the player core.
//!
//! ## Overview
//!
//! A [`CoreConfig`] carries every bridge and setting the core needs. It is
//! built through [`CoreConfigBuilder`], which validates eagerly and fails
//! with an actionable message when a required capability is missing.
//!
//! ## Required Dependencies
//!
//! - `AudioOutput` - the host's audio element, never defaulted
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - catalog requests and downloads (desktop default: reqwest)
//! - `BlobStore` - offline tracks and playlists (desktop default: tokio fs under `data_dir`)
//! - `Clock` - timestamps (default: system clock)
//!
//! Defaults for `HttpClient` and `BlobStore` are only injected when the
//! `desktop-shims` feature is enabled. Other hosts must provide them.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/path/to/app-data")
//!     .api_base_url("https://music.example.com")
//!     .audio_output(Arc::new(MyAudioOutput::new()))
//!     .max_concurrent_downloads(2)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AudioOutput, BlobStore, Clock, HttpClient, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Hosts whose cover images are generated placeholders and never worth caching.
pub const DEFAULT_SKIPPED_COVER_HOSTS: &[&str] = &["ui-avatars.com"];

/// Upper bound for the download worker pool.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for app-owned data (default blob store root)
    pub data_dir: PathBuf,

    /// Base URL of the catalog API, without a trailing slash
    pub api_base_url: String,

    pub http_client: Arc<dyn HttpClient>,

    pub blob_store: Arc<dyn BlobStore>,

    pub audio_output: Arc<dyn AudioOutput>,

    pub clock: Arc<dyn Clock>,

    /// Download orchestration settings
    pub downloads: DownloadSettings,

    /// Elapsed time after which "previous" restarts the current track
    pub restart_threshold: Duration,

    /// Capacity of the event bus broadcast channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .field("audio_output", &"AudioOutput { ... }")
            .field("clock", &"Clock { ... }")
            .field("downloads", &self.downloads)
            .field("restart_threshold", &self.restart_threshold)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Settings for the download orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// How many different tracks may download at once. Default: 1
    pub max_concurrent_downloads: usize,

    /// Upper bound on a single audio transfer. Default: 5 minutes
    pub download_timeout: Duration,

    /// Cover URLs containing any of these hosts are not fetched
    pub skipped_cover_hosts: Vec<String>,
}

impl Default for DownloadSettings {
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

impl DownloadSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        if self.max_concurrent_downloads > MAX_CONCURRENT_DOWNLOADS {
            return Err(Error::Config(format!(
                "max_concurrent_downloads exceeds maximum of {}",
                MAX_CONCURRENT_DOWNLOADS
            )));
        }

        if self.download_timeout.is_zero() {
            return Err(Error::Config(
                "download_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Data directory is not empty
    /// - API base URL is an absolute http(s) URL
    /// - Download settings are within bounds
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }

        self.downloads.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn audio_output_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioOutput".to_string(),
        message: "AudioOutput implementation is required to play anything. \
                 Inject the host's audio element adapter with .audio_output()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    Ok(Arc::new(ReqwestHttpClient::new()?))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject a platform-native adapter with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store(data_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    use bridge_desktop::FsBlobStore;

    Ok(Arc::new(FsBlobStore::with_root(data_dir.join("blobs"))))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store(_data_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    Err(Error::CapabilityMissing {
        capability: "BlobStore".to_string(),
        message: "No BlobStore implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use FsBlobStore. \
                 Mobile: inject storage backed by the platform database with .blob_store()."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    clock: Option<Arc<dyn Clock>>,
    downloads: DownloadSettings,
    restart_threshold: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the catalog API base URL. A trailing slash is stripped.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// If not provided, `ReqwestHttpClient` is used when `desktop-shims` is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// If not provided, `FsBlobStore` rooted at `<data_dir>/blobs` is used
    /// when `desktop-shims` is enabled.
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Sets the audio output (required).
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Default: 1
    pub fn max_concurrent_downloads(mut self, count: usize) -> Self {
        self.downloads.max_concurrent_downloads = count;
        self
    }

    /// Default: 300 seconds
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.downloads.download_timeout = timeout;
        self
    }

    /// Replaces the list of cover hosts that are never downloaded.
    pub fn skipped_cover_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.downloads.skipped_cover_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Default: 3 seconds
    pub fn restart_threshold(mut self, threshold: Duration) -> Self {
        self.restart_threshold = Some(threshold);
        self
    }

    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::Config` when `data_dir` or `api_base_url` is missing or a
    ///   value is out of range
    /// - `Error::CapabilityMissing` when a required bridge is absent and no
    ///   platform default applies
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config(
                "API base URL is required. Use .api_base_url() to set it.".to_string(),
            )
        })?;

        let audio_output = self.audio_output.ok_or_else(audio_output_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store(&data_dir)?,
        };

        let config = CoreConfig {
            data_dir,
            api_base_url,
            http_client,
            blob_store,
            audio_output,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            downloads: self.downloads,
            restart_threshold: self.restart_threshold.unwrap_or(Duration::from_secs(3)),
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
        };

        config.validate()?;

        Ok(config)
    }
}
