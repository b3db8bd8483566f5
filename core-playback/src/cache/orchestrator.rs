//! # Download Orchestrator
//!
//! Fetches tracks for offline playback and persists them.
//!
//! - Single-flight per track id; a second request for the same id is a no-op
//! - At most `max_concurrent_downloads` transfers run at once (semaphore)
//! - The audio fetch is all-or-nothing: nothing is persisted on failure
//! - Cover art is best-effort and never fails a download
//!
//! Downloads run independently of playback. Switching tracks never cancels
//! a transfer.

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::time::Clock;
use bytes::{Bytes, BytesMut};
use core_library::models::{PersistedTrack, Track, TrackId};
use core_library::repositories::OfflineTrackRepository;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::config::DownloadConfig;
use crate::cache::index::CacheIndex;
use crate::cache::progress::DownloadProgress;
use crate::error::{PlaybackError, Result};

/// How a download request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The track was fetched and persisted.
    Completed { has_cover: bool },
    /// The track was already in the cache index. Nothing was fetched.
    AlreadyCached,
    /// Another request for the same track is running. Nothing was fetched.
    InFlight,
}

/// Upper bound on the up-front buffer reservation. `Content-Length` is a hint
/// from the server; larger bodies still grow the buffer as chunks arrive.
const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

type ActiveDownloads = Arc<Mutex<HashMap<TrackId, DownloadProgress>>>;

/// Removes the in-flight entry on every exit path.
struct ActiveSlot {
    active: ActiveDownloads,
    track_id: TrackId,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active.lock().remove(&self.track_id);
    }
}

/// Fetch-and-persist pipeline for offline tracks.
pub struct DownloadOrchestrator {
    config: DownloadConfig,
    http_client: Arc<dyn HttpClient>,
    tracks: Arc<dyn OfflineTrackRepository>,
    index: Arc<CacheIndex>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    download_semaphore: Arc<Semaphore>,
    active_downloads: ActiveDownloads,
}

impl DownloadOrchestrator {
    pub fn new(
        config: DownloadConfig,
        http_client: Arc<dyn HttpClient>,
        tracks: Arc<dyn OfflineTrackRepository>,
        index: Arc<CacheIndex>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads));

        Ok(Self {
            config,
            http_client,
            tracks,
            index,
            clock,
            event_bus: None,
            download_semaphore,
            active_downloads: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Set event bus for progress events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn index(&self) -> &Arc<CacheIndex> {
        &self.index
    }

    /// Download a track for offline playback.
    ///
    /// Returns without doing anything if the track is already cached or a
    /// download for it is running. Otherwise fetches the audio in full,
    /// then the cover (best-effort), persists both and adds the id to the
    /// cache index.
    ///
    /// # Errors
    ///
    /// A failed or timed out audio fetch, or a failed write, returns an
    /// error. The cache index and the store are left unchanged, so the call
    /// can be retried.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn download(&self, track: &Track) -> Result<DownloadOutcome> {
        if self.index.has(&track.id) {
            debug!("Track already cached");
            return Ok(DownloadOutcome::AlreadyCached);
        }

        let slot = {
            let mut active = self.active_downloads.lock();
            if active.contains_key(&track.id) {
                debug!("Track already downloading");
                return Ok(DownloadOutcome::InFlight);
            }
            active.insert(track.id.clone(), DownloadProgress::new(None));
            ActiveSlot {
                active: self.active_downloads.clone(),
                track_id: track.id.clone(),
            }
        };

        let _permit = self
            .download_semaphore
            .acquire()
            .await
            .map_err(|_| PlaybackError::download(&track.id, "download queue closed"))?;

        info!(title = %track.title, "Starting download");
        self.emit(DownloadEvent::Started {
            track_id: track.id.to_string(),
        });

        let result = self.fetch_and_persist(track).await;
        drop(slot);

        match result {
            Ok(has_cover) => {
                info!(has_cover, "Download completed");
                self.emit(DownloadEvent::Completed {
                    track_id: track.id.to_string(),
                    has_cover,
                });
                Ok(DownloadOutcome::Completed { has_cover })
            }
            Err(e) => {
                error!(error = %e, "Download failed");
                self.emit(DownloadEvent::Failed {
                    track_id: track.id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Delete the offline copy of a track.
    ///
    /// Returns whether the track was indexed. A source already handed to
    /// the audio output keeps playing.
    #[instrument(skip(self))]
    pub async fn remove(&self, track_id: &TrackId) -> Result<bool> {
        self.tracks.delete(track_id).await?;
        let was_cached = self.index.remove(track_id);
        info!(was_cached, "Removed offline track");
        self.emit(DownloadEvent::Removed {
            track_id: track_id.to_string(),
        });
        Ok(was_cached)
    }

    pub fn is_downloading(&self, track_id: &TrackId) -> bool {
        self.active_downloads.lock().contains_key(track_id)
    }

    /// Progress of an in-flight download, `None` once it has settled.
    pub fn progress(&self, track_id: &TrackId) -> Option<u8> {
        self.active_downloads
            .lock()
            .get(track_id)
            .map(DownloadProgress::percent)
    }

    pub fn active_downloads(&self) -> Vec<TrackId> {
        let mut ids: Vec<_> = self.active_downloads.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    async fn fetch_and_persist(&self, track: &Track) -> Result<bool> {
        let audio = tokio::time::timeout(self.config.download_timeout, self.fetch_audio(track))
            .await
            .map_err(|_| PlaybackError::DownloadTimeout(track.id.to_string()))??;

        let cover = self.fetch_cover(track).await;
        let has_cover = cover.is_some();

        self.tracks
            .save(PersistedTrack {
                track: track.clone(),
                audio,
                cover,
                saved_at: self.clock.unix_timestamp_millis(),
            })
            .await
            .map_err(|e| PlaybackError::download(&track.id, e))?;

        self.index.add(track.id.clone());
        self.set_progress_complete(&track.id);
        Ok(has_cover)
    }

    async fn fetch_audio(&self, track: &Track) -> Result<Bytes> {
        if track.audio_url.trim().is_empty() {
            return Err(PlaybackError::download(&track.id, "track has no audio URL"));
        }

        let mut stream = self
            .http_client
            .download_stream(track.audio_url.clone())
            .await
            .map_err(|e| PlaybackError::download(&track.id, e))?;

        if !stream.is_success() {
            return Err(PlaybackError::download(
                &track.id,
                format!("server answered with status {}", stream.status),
            ));
        }

        if let Some(progress) = self.active_downloads.lock().get_mut(&track.id) {
            *progress = DownloadProgress::new(stream.content_length);
        }

        let reserve = stream
            .content_length
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
            .min(MAX_PREALLOCATION);
        let mut buffer = BytesMut::with_capacity(reserve);
        while let Some(chunk) = stream.chunks.next().await {
            let chunk = chunk.map_err(|e| PlaybackError::download(&track.id, e))?;
            buffer.extend_from_slice(&chunk);
            self.record_progress(&track.id, chunk.len() as u64);
        }

        if buffer.is_empty() {
            return Err(PlaybackError::download(&track.id, "empty audio payload"));
        }

        debug!(bytes = buffer.len(), "Audio payload received");
        Ok(buffer.freeze())
    }

    async fn fetch_cover(&self, track: &Track) -> Option<Bytes> {
        if !self.config.should_fetch_cover(&track.cover_url) {
            return None;
        }

        let request = HttpRequest::get(track.cover_url.clone()).timeout(self.config.download_timeout);
        match self.http_client.execute(request).await {
            Ok(response) if response.is_success() && !response.body.is_empty() => Some(response.body),
            Ok(response) => {
                warn!(status = response.status, "Cover download rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Cover download failed");
                None
            }
        }
    }

    fn record_progress(&self, track_id: &TrackId, bytes: u64) {
        let grown = self
            .active_downloads
            .lock()
            .get_mut(track_id)
            .and_then(|progress| progress.advance(bytes));

        if let Some(percent) = grown {
            self.emit(DownloadEvent::Progress {
                track_id: track_id.to_string(),
                percent,
            });
        }
    }

    fn set_progress_complete(&self, track_id: &TrackId) {
        let completed = self
            .active_downloads
            .lock()
            .get_mut(track_id)
            .map(DownloadProgress::complete);

        if let Some(percent) = completed {
            self.emit(DownloadEvent::Progress {
                track_id: track_id.to_string(),
                percent,
            });
        }
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }
}
