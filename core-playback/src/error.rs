//! # Playback Error Types
//!
//! Errors raised by the cache, the download orchestrator and the playback
//! session.

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback and offline caching.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// No playable source could be derived for a track.
    #[error("Failed to resolve audio source: {0}")]
    SourceResolution(String),

    // ========================================================================
    // Download Errors
    // ========================================================================
    /// Fetching or persisting an offline copy failed. Nothing was stored.
    #[error("Download of track {track_id} failed: {message}")]
    Download { track_id: String, message: String },

    /// The audio transfer exceeded the configured timeout.
    #[error("Download of track {0} timed out")]
    DownloadTimeout(String),

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// The current track is not part of the active queue.
    #[error("Track {0} is not in the active queue")]
    QueueNavigation(String),

    /// Attempted operation when nothing is loaded.
    #[error("No playback target loaded")]
    NoTargetLoaded,

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// The host audio output rejected a command.
    #[error("Audio output error: {0}")]
    Output(String),

    /// The blob store failed outside of a download.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    pub fn download(track_id: impl ToString, message: impl ToString) -> Self {
        PlaybackError::Download {
            track_id: track_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Download { .. }
                | PlaybackError::DownloadTimeout(_)
                | PlaybackError::SourceResolution(_)
                | PlaybackError::Storage(_)
        )
    }

    /// Returns `true` if this error came out of the download orchestrator.
    pub fn is_download_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Download { .. } | PlaybackError::DownloadTimeout(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        PlaybackError::Output(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
