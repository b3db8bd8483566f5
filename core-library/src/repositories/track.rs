//! Offline track repository
//!
//! One blob store record per downloaded track, keyed by track id. The
//! record metadata is the serialized [`Track`]; the payloads ride along as
//! the `audio` and optional `cover` attachments.

use async_trait::async_trait;
use bridge_traits::blob_store::{BlobRecord, BlobStore};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};
use crate::models::{PersistedTrack, Track, TrackId};

pub const TRACKS_COLLECTION: &str = "tracks";

const AUDIO_ATTACHMENT: &str = "audio";
const COVER_ATTACHMENT: &str = "cover";

/// Offline track storage interface
#[async_trait]
pub trait OfflineTrackRepository: Send + Sync {
    /// Store a downloaded track, replacing any previous copy.
    async fn save(&self, record: PersistedTrack) -> Result<()>;

    /// Load a downloaded track with its payloads.
    ///
    /// # Returns
    /// - `Ok(None)` if the track is not stored
    /// - `Err` if the record exists but has no audio payload
    async fn get(&self, id: &TrackId) -> Result<Option<PersistedTrack>>;

    /// Metadata of every stored track, oldest first, flagged as local.
    async fn list(&self) -> Result<Vec<Track>>;

    /// Delete a stored track. Missing ids are ignored.
    async fn delete(&self, id: &TrackId) -> Result<()>;

    /// Ids of every stored track.
    async fn ids(&self) -> Result<Vec<TrackId>>;
}

/// [`OfflineTrackRepository`] over the host blob store
pub struct BlobOfflineTrackRepository {
    store: Arc<dyn BlobStore>,
}

impl BlobOfflineTrackRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OfflineTrackRepository for BlobOfflineTrackRepository {
    async fn save(&self, record: PersistedTrack) -> Result<()> {
        record
            .track
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "track".to_string(),
                message,
            })?;

        let mut blob = BlobRecord::from_json(record.track.id.as_str(), &record.track, record.saved_at)?
            .with_attachment(AUDIO_ATTACHMENT, record.audio);
        if let Some(cover) = record.cover {
            blob = blob.with_attachment(COVER_ATTACHMENT, cover);
        }

        self.store.put(TRACKS_COLLECTION, blob).await?;
        debug!(track_id = %record.track.id, "Stored offline track");
        Ok(())
    }

    async fn get(&self, id: &TrackId) -> Result<Option<PersistedTrack>> {
        let Some(blob) = self.store.get(TRACKS_COLLECTION, id.as_str()).await? else {
            return Ok(None);
        };

        let track: Track = blob.decode()?;
        let audio = blob
            .attachment(AUDIO_ATTACHMENT)
            .cloned()
            .ok_or_else(|| LibraryError::Corrupt(format!("track {} has no audio payload", id)))?;

        Ok(Some(PersistedTrack {
            track: track.as_local(),
            audio,
            cover: blob.attachment(COVER_ATTACHMENT).cloned(),
            saved_at: blob.saved_at,
        }))
    }

    async fn list(&self) -> Result<Vec<Track>> {
        let records = self.store.list_all(TRACKS_COLLECTION).await?;
        let mut tracks = Vec::with_capacity(records.len());
        for record in records {
            match record.decode::<Track>() {
                Ok(track) => tracks.push(track.as_local()),
                Err(e) => warn!(key = %record.key, error = %e, "Skipping unreadable offline track"),
            }
        }
        Ok(tracks)
    }

    async fn delete(&self, id: &TrackId) -> Result<()> {
        self.store.delete(TRACKS_COLLECTION, id.as_str()).await?;
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<TrackId>> {
        let records = self.store.list_all(TRACKS_COLLECTION).await?;
        Ok(records.into_iter().map(|r| TrackId(r.key)).collect())
    }
}
