//! Core service façade and bootstrap.
//!
//! [`PlayerService`] wires a validated [`CoreConfig`] into the playback
//! session, the offline cache, the catalog client and the playlist store,
//! and exposes the operations a UI binds to. Desktop hosts typically enable
//! the `desktop-shims` feature so missing HTTP and storage bridges fall back
//! to `bridge-desktop`.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .data_dir("/var/lib/player")
//!     .api_base_url("https://api.example.com")
//!     .audio_output(output)
//!     .build()?;
//! let service = PlayerService::new(config)?;
//! service.bootstrap().await;
//! ```

pub mod error;
pub mod library;

pub use error::{CoreError, Result};
pub use library::LibraryState;

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::playback::OutputEvent;
use bridge_traits::time::Clock;
use core_library::catalog::DEFAULT_PAGE_SIZE;
use core_library::{
    BlobOfflineTrackRepository, BlobPlaylistRepository, CatalogApi, HttpCatalogApi, LibraryError,
    Lyrics, OfflineTrackRepository, Playlist, PlaylistId, PlaylistRepository, RadioStation, Track,
    TrackId,
};
use core_playback::{
    CacheIndex, CoverArt, DownloadConfig, DownloadOrchestrator, DownloadOutcome, PlaybackSession,
    PlaybackSnapshot, RepeatMode, SessionConfig, SourceResolver,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, LibraryEvent};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Cover used for playlists created without one; the timestamp keeps
/// placeholders distinct.
fn placeholder_cover(timestamp: i64) -> String {
    format!("https://picsum.photos/400/400?random={}", timestamp)
}

/// Outcome of [`PlayerService::bootstrap`]. `None` marks a step that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub cached_tracks: Option<usize>,
    pub persisted_playlists: Option<usize>,
}

/// Everything the UI renders for the player in one read.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub playback: PlaybackSnapshot,
    pub downloaded: Vec<TrackId>,
    pub downloading: Vec<TrackId>,
}

pub struct PlayerService {
    session: Arc<PlaybackSession>,
    downloads: DownloadOrchestrator,
    index: Arc<CacheIndex>,
    tracks: Arc<dyn OfflineTrackRepository>,
    playlist_store: Arc<dyn PlaylistRepository>,
    catalog: Arc<dyn CatalogApi>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    library: RwLock<LibraryState>,
    builtin_playlists: Vec<Playlist>,
    cache_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerService {
    /// Build the service from a validated configuration.
    ///
    /// Nothing is read from storage here; call [`bootstrap`](Self::bootstrap)
    /// once a runtime is available.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer_size);

        let tracks: Arc<dyn OfflineTrackRepository> =
            Arc::new(BlobOfflineTrackRepository::new(config.blob_store.clone()));
        let playlist_store: Arc<dyn PlaylistRepository> =
            Arc::new(BlobPlaylistRepository::new(config.blob_store.clone()));
        let catalog: Arc<dyn CatalogApi> = Arc::new(HttpCatalogApi::new(
            config.http_client.clone(),
            config.api_base_url.clone(),
        ));

        let index = Arc::new(CacheIndex::new());
        let downloads = DownloadOrchestrator::new(
            DownloadConfig::from(&config.downloads),
            config.http_client.clone(),
            tracks.clone(),
            index.clone(),
            config.clock.clone(),
        )?
        .with_event_bus(event_bus.clone());

        let resolver = SourceResolver::new(index.clone(), tracks.clone(), config.audio_output.clone());
        let session = PlaybackSession::new(
            SessionConfig::default().with_restart_threshold(config.restart_threshold),
            config.audio_output.clone(),
            resolver,
        )?
        .with_event_bus(event_bus.clone());

        info!(api = %config.api_base_url, data_dir = %config.data_dir.display(), "Player service created");

        Ok(Self {
            session: Arc::new(session),
            downloads,
            index,
            tracks,
            playlist_store,
            catalog,
            clock: config.clock,
            event_bus,
            library: RwLock::new(LibraryState::default()),
            builtin_playlists: Vec::new(),
            cache_watcher: Mutex::new(None),
        })
    }

    /// Seed the in-memory library.
    pub fn with_library(self, tracks: Vec<Track>) -> Self {
        let playlists = self.library.read().playlists().to_vec();
        *self.library.write() = LibraryState::new(tracks, playlists);
        self
    }

    /// Playlists that always exist and come first in the list.
    pub fn with_builtin_playlists(mut self, playlists: Vec<Playlist>) -> Self {
        let tracks = self.library.read().tracks().to_vec();
        *self.library.write() = LibraryState::new(tracks, playlists.clone());
        self.builtin_playlists = playlists;
        self
    }

    /// Replace the catalog client.
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogApi>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Restore persisted state and start reacting to finished downloads.
    ///
    /// The cache index rebuild and the playlist load fail independently;
    /// a failed step is logged and leaves its part empty.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        match self.index.load_from(self.tracks.as_ref()).await {
            Ok(count) => report.cached_tracks = Some(count),
            Err(e) => warn!(error = %e, "Failed to rebuild cache index"),
        }

        match self.playlist_store.list().await {
            Ok(persisted) => {
                let kept = self
                    .library
                    .write()
                    .merge_playlists(&self.builtin_playlists, persisted);
                report.persisted_playlists = Some(kept);
            }
            Err(e) => warn!(error = %e, "Failed to load playlists"),
        }

        {
            let mut watcher = self.cache_watcher.lock();
            if watcher.is_none() {
                *watcher = Some(PlaybackSession::spawn_cache_watcher(&self.session, &self.index));
            }
        }

        info!(?report, "Bootstrap finished");
        report
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn events(&self) -> EventStream {
        self.event_bus.stream()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Play `track`, replacing the queue when `queue` is given.
    pub async fn play_track(&self, track: Track, queue: Option<Vec<Track>>) -> Result<()> {
        Ok(self.session.play_track(track, queue).await?)
    }

    pub async fn play_radio(&self, station: RadioStation) -> Result<()> {
        Ok(self.session.play_radio(station).await?)
    }

    pub async fn toggle_play(&self) -> Result<bool> {
        Ok(self.session.toggle_play().await?)
    }

    pub async fn next(&self) -> Result<()> {
        Ok(self.session.next().await?)
    }

    pub async fn prev(&self) -> Result<()> {
        Ok(self.session.prev().await?)
    }

    pub async fn seek(&self, position: Duration) -> Result<Duration> {
        Ok(self.session.seek(position).await?)
    }

    pub fn toggle_repeat(&self) -> RepeatMode {
        self.session.toggle_repeat()
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.session.toggle_shuffle()
    }

    /// Forward a notification from the host audio output.
    pub async fn handle_output_event(&self, event: OutputEvent) -> Result<()> {
        Ok(self.session.handle_output_event(event).await?)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let mut downloaded: Vec<TrackId> = self.index.snapshot().into_iter().collect();
        downloaded.sort();
        PlayerSnapshot {
            playback: self.session.snapshot(),
            downloaded,
            downloading: self.downloads.active_downloads(),
        }
    }

    pub fn current_track(&self) -> Option<Track> {
        self.session.current_track()
    }

    pub fn queue(&self) -> Vec<Track> {
        self.session.queue()
    }

    pub fn display_cover(&self) -> Option<CoverArt> {
        self.session.display_cover()
    }

    pub fn cover_for(&self, track: &Track) -> CoverArt {
        self.session.cover_for(track)
    }

    // ========================================================================
    // Offline cache
    // ========================================================================

    pub async fn download_track(&self, track: &Track) -> Result<DownloadOutcome> {
        Ok(self.downloads.download(track).await?)
    }

    /// Delete the offline copy. The loaded source keeps playing.
    pub async fn remove_downloaded_track(&self, track_id: &TrackId) -> Result<bool> {
        let removed = self.downloads.remove(track_id).await?;
        self.session.forget_cover(track_id);
        Ok(removed)
    }

    pub fn is_downloaded(&self, track_id: &TrackId) -> bool {
        self.index.has(track_id)
    }

    pub fn is_downloading(&self, track_id: &TrackId) -> bool {
        self.downloads.is_downloading(track_id)
    }

    pub fn download_progress(&self, track_id: &TrackId) -> Option<u8> {
        self.downloads.progress(track_id)
    }

    /// Metadata of every stored track, oldest first.
    pub async fn downloaded_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.list().await?)
    }

    // ========================================================================
    // Library and playlists
    // ========================================================================

    /// Put a track at the front of the library and of the queue.
    pub fn add_track(&self, track: Track) {
        self.library.write().prepend_track(track.clone());
        self.session.prepend_to_queue(track.clone());
        self.emit(LibraryEvent::TrackAdded {
            track_id: track.id.to_string(),
            title: track.title,
        });
    }

    pub fn library(&self) -> Vec<Track> {
        self.library.read().tracks().to_vec()
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.library.read().playlists().to_vec()
    }

    pub fn playlist_tracks(&self, id: &PlaylistId) -> Vec<Track> {
        self.library.read().playlist_tracks(id)
    }

    /// Create and persist an empty playlist. Without a cover a placeholder
    /// image URL is used.
    #[instrument(skip(self, cover_url))]
    pub async fn create_playlist(&self, name: &str, cover_url: Option<String>) -> Result<Playlist> {
        let created_at = self.clock.unix_timestamp_millis();
        let id = {
            let library = self.library.read();
            let mut millis = created_at;
            while library.playlist(&PlaylistId::from_timestamp(millis)).is_some() {
                millis += 1;
            }
            PlaylistId::from_timestamp(millis)
        };

        let cover = cover_url
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| placeholder_cover(created_at));
        let playlist = Playlist::new(id, name.trim(), cover, created_at);

        self.playlist_store.save(&playlist).await?;
        self.library.write().upsert_playlist(playlist.clone());

        info!(playlist_id = %playlist.id, "Playlist created");
        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.to_string(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    /// Add `track` to a playlist. Ids are never duplicated; the track also
    /// joins the library when it is new there.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn add_to_playlist(&self, playlist_id: &PlaylistId, track: &Track) -> Result<Playlist> {
        let mut playlist = self
            .library
            .read()
            .playlist(playlist_id)
            .cloned()
            .ok_or_else(|| LibraryError::not_found("playlist", playlist_id.as_str()))?;

        self.library.write().ensure_track(track);

        if !playlist.add_track(track.id.clone()) {
            return Ok(playlist);
        }

        self.playlist_store.save(&playlist).await?;
        self.library.write().upsert_playlist(playlist.clone());

        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist.id.to_string(),
            track_count: playlist.track_ids.len(),
        });
        Ok(playlist)
    }

    pub async fn delete_playlist(&self, playlist_id: &PlaylistId) -> Result<bool> {
        self.playlist_store.delete(playlist_id).await?;
        let removed = self.library.write().remove_playlist(playlist_id);
        if removed {
            self.emit(LibraryEvent::PlaylistDeleted {
                playlist_id: playlist_id.to_string(),
            });
        }
        Ok(removed)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn search(&self, query: &str, page: u32) -> Result<Vec<Track>> {
        Ok(self.catalog.search_tracks(query, DEFAULT_PAGE_SIZE, page).await?)
    }

    pub async fn genre_tracks(&self, genre_id: u32) -> Result<Vec<Track>> {
        Ok(self.catalog.genre_tracks(genre_id, DEFAULT_PAGE_SIZE).await?)
    }

    pub async fn fetch_track(&self, id: &TrackId) -> Result<Track> {
        Ok(self.catalog.track(id).await?)
    }

    pub async fn lyrics(&self, track: &Track) -> Result<Option<Lyrics>> {
        Ok(self.catalog.lyrics(&track.id, &track.title, &track.artist).await?)
    }

    pub async fn radio_stations(&self) -> Result<Vec<RadioStation>> {
        Ok(self.catalog.radio_stations().await?)
    }

    pub async fn health(&self) -> bool {
        self.catalog.health().await
    }

    fn emit(&self, event: LibraryEvent) {
        let _ = self.event_bus.emit(CoreEvent::Library(event));
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        if let Some(watcher) = self.cache_watcher.get_mut().take() {
            watcher.abort();
        }
    }
}
