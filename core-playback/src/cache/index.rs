//! In-memory index of offline tracks

use core_library::models::TrackId;
use core_library::repositories::OfflineTrackRepository;
use parking_lot::RwLock;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::Result;

const CHANGE_BUFFER: usize = 64;

/// A mutation of the cache index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    Added(TrackId),
    Removed(TrackId),
}

/// Set of track ids that have a persisted audio payload.
///
/// This is the authority on whether a track plays offline; `Track::is_local`
/// is only a hint. Entries stay until explicitly removed. There is no size
/// cap and no eviction, so the offline store grows until the user deletes
/// tracks.
pub struct CacheIndex {
    ids: RwLock<HashSet<TrackId>>,
    changes: broadcast::Sender<CacheChange>,
}

impl CacheIndex {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            ids: RwLock::new(HashSet::new()),
            changes,
        }
    }

    pub fn has(&self, id: &TrackId) -> bool {
        self.ids.read().contains(id)
    }

    /// Insert `id`. Returns `false` if it was already present.
    pub fn add(&self, id: TrackId) -> bool {
        let inserted = self.ids.write().insert(id.clone());
        if inserted {
            let _ = self.changes.send(CacheChange::Added(id));
        }
        inserted
    }

    /// Remove `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: &TrackId) -> bool {
        let removed = self.ids.write().remove(id);
        if removed {
            let _ = self.changes.send(CacheChange::Removed(id.clone()));
        }
        removed
    }

    /// Replace the whole set without publishing per-id changes.
    pub fn rebuild<I>(&self, ids: I)
    where
        I: IntoIterator<Item = TrackId>,
    {
        let mut set = self.ids.write();
        set.clear();
        set.extend(ids);
        debug!(count = set.len(), "Cache index rebuilt");
    }

    /// Rebuild from the offline track store.
    pub async fn load_from(&self, tracks: &dyn OfflineTrackRepository) -> Result<usize> {
        let ids = tracks.ids().await?;
        let count = ids.len();
        self.rebuild(ids);
        info!(count, "Loaded offline track index");
        Ok(count)
    }

    pub fn snapshot(&self) -> HashSet<TrackId> {
        self.ids.read().clone()
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
        self.changes.subscribe()
    }
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self::new()
    }
}
