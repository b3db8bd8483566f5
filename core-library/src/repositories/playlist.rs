//! Playlist repository trait and implementation

use async_trait::async_trait;
use bridge_traits::blob_store::{BlobRecord, BlobStore};
use std::sync::Arc;
use tracing::warn;

use crate::error::{LibraryError, Result};
use crate::models::{Playlist, PlaylistId};

pub const PLAYLISTS_COLLECTION: &str = "playlists";

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(playlist))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>>;

    /// Insert or replace a playlist
    ///
    /// # Errors
    /// Returns error if validation fails or the store rejects the write
    async fn save(&self, playlist: &Playlist) -> Result<()>;

    /// Delete a playlist by ID
    ///
    /// # Returns
    /// - `Ok(true)` if playlist was deleted
    /// - `Ok(false)` if playlist was not found
    async fn delete(&self, id: &PlaylistId) -> Result<bool>;

    /// All playlists, oldest first
    async fn list(&self) -> Result<Vec<Playlist>>;
}

/// [`PlaylistRepository`] over the host blob store
pub struct BlobPlaylistRepository {
    store: Arc<dyn BlobStore>,
}

impl BlobPlaylistRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PlaylistRepository for BlobPlaylistRepository {
    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        match self.store.get(PLAYLISTS_COLLECTION, id.as_str()).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, playlist: &Playlist) -> Result<()> {
        playlist
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "playlist".to_string(),
                message,
            })?;

        // Updates keep the first creation time
        let created_at = match self.find_by_id(&playlist.id).await? {
            Some(existing) => existing.created_at,
            None => playlist.created_at,
        };
        let stored = Playlist {
            created_at,
            ..playlist.clone()
        };

        let record = BlobRecord::from_json(stored.id.as_str(), &stored, created_at)?;
        self.store.put(PLAYLISTS_COLLECTION, record).await?;
        Ok(())
    }

    async fn delete(&self, id: &PlaylistId) -> Result<bool> {
        if self.store.get(PLAYLISTS_COLLECTION, id.as_str()).await?.is_none() {
            return Ok(false);
        }
        self.store.delete(PLAYLISTS_COLLECTION, id.as_str()).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<Playlist>> {
        let records = self.store.list_all(PLAYLISTS_COLLECTION).await?;
        let mut playlists = Vec::with_capacity(records.len());
        for record in records {
            match record.decode::<Playlist>() {
                Ok(playlist) => playlists.push(playlist),
                Err(e) => warn!(key = %record.key, error = %e, "Skipping unreadable playlist"),
            }
        }
        playlists.sort_by_key(|p| p.created_at);
        Ok(playlists)
    }
}
