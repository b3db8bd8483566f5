//! # Source Resolution
//!
//! Decides what the audio output should load for a target: the local copy
//! of a cached track, the track's remote URL, or a station stream.
//!
//! Local payloads are registered with the output as buffers. Each buffer is
//! owned by a [`SourceLease`] and released when the lease drops, so a
//! superseded or failed load can never leak one.

use bridge_traits::playback::{AudioOutput, AudioSource, BufferHandle};
use bytes::Bytes;
use core_library::models::{RadioStation, Track, TrackId};
use core_library::repositories::OfflineTrackRepository;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheIndex;
use crate::error::{PlaybackError, Result};

/// Where a resolved source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Remote { url: String },
    Local,
}

/// A registered buffer, released on drop.
pub struct SourceLease {
    output: Arc<dyn AudioOutput>,
    handle: BufferHandle,
}

impl SourceLease {
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        debug!(handle = %self.handle, "Releasing audio buffer");
        self.output.release_buffer(self.handle);
    }
}

impl fmt::Debug for SourceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLease")
            .field("handle", &self.handle)
            .finish()
    }
}

/// A source ready to hand to the audio output.
#[derive(Debug)]
pub struct ResolvedSource {
    pub source: AudioSource,
    pub origin: SourceOrigin,
    lease: Option<SourceLease>,
}

impl ResolvedSource {
    pub fn remote(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            source: AudioSource::remote(url.clone()),
            origin: SourceOrigin::Remote { url },
            lease: None,
        }
    }

    fn local(lease: SourceLease) -> Self {
        Self {
            source: AudioSource::Buffer {
                handle: lease.handle(),
            },
            origin: SourceOrigin::Local,
            lease: Some(lease),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == SourceOrigin::Local
    }

    /// Give up the source, keeping the buffer alive in the returned lease.
    pub fn into_lease(self) -> Option<SourceLease> {
        self.lease
    }
}

/// Cover art to display for a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverArt {
    /// Cover image stored with the offline copy.
    Local(Bytes),
    Remote(String),
}

/// Locally stored covers keyed by track id. Tracks themselves never change.
#[derive(Debug, Default)]
pub struct CoverOverrides {
    covers: RwLock<HashMap<TrackId, Bytes>>,
}

impl CoverOverrides {
    pub fn set(&self, id: TrackId, cover: Bytes) {
        self.covers.write().insert(id, cover);
    }

    pub fn forget(&self, id: &TrackId) {
        self.covers.write().remove(id);
    }

    /// The stored cover if one was resolved, otherwise the track's URL.
    pub fn display_cover(&self, track: &Track) -> CoverArt {
        match self.covers.read().get(&track.id) {
            Some(bytes) => CoverArt::Local(bytes.clone()),
            None => CoverArt::Remote(track.cover_url.clone()),
        }
    }
}

/// Maps playback targets to audio sources.
pub struct SourceResolver {
    index: Arc<CacheIndex>,
    tracks: Arc<dyn OfflineTrackRepository>,
    output: Arc<dyn AudioOutput>,
    covers: Arc<CoverOverrides>,
}

impl SourceResolver {
    pub fn new(
        index: Arc<CacheIndex>,
        tracks: Arc<dyn OfflineTrackRepository>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            index,
            tracks,
            output,
            covers: Arc::new(CoverOverrides::default()),
        }
    }

    pub fn covers(&self) -> &Arc<CoverOverrides> {
        &self.covers
    }

    pub fn is_cached(&self, id: &TrackId) -> bool {
        self.index.has(id)
    }

    /// Resolve a track, preferring its offline copy.
    ///
    /// Any failure reading the local copy falls back to the remote URL.
    ///
    /// # Errors
    ///
    /// `SourceResolution` when the track is not cached and has no URL.
    pub async fn resolve_track(&self, track: &Track) -> Result<ResolvedSource> {
        if self.index.has(&track.id) {
            match self.load_local(track).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => warn!(track_id = %track.id, error = %e, "Local copy unusable, streaming instead"),
            }
        }

        if track.audio_url.trim().is_empty() {
            return Err(PlaybackError::SourceResolution(format!(
                "track {} has no audio URL",
                track.id
            )));
        }

        Ok(ResolvedSource::remote(track.audio_url.clone()))
    }

    /// Stations always stream.
    pub fn resolve_station(&self, station: &RadioStation) -> Result<ResolvedSource> {
        if station.url.trim().is_empty() {
            return Err(PlaybackError::SourceResolution(format!(
                "station {} has no stream URL",
                station.id
            )));
        }
        Ok(ResolvedSource::remote(station.url.clone()))
    }

    async fn load_local(&self, track: &Track) -> Result<ResolvedSource> {
        let record = self
            .tracks
            .get(&track.id)
            .await?
            .ok_or_else(|| PlaybackError::SourceResolution(format!("no stored copy of {}", track.id)))?;

        let handle = self
            .output
            .register_buffer(record.audio)
            .map_err(|e| PlaybackError::SourceResolution(e.to_string()))?;
        let lease = SourceLease {
            output: self.output.clone(),
            handle,
        };

        if let Some(cover) = record.cover {
            self.covers.set(track.id.clone(), cover);
        }

        debug!(track_id = %track.id, handle = %handle, "Resolved local source");
        Ok(ResolvedSource::local(lease))
    }
}
