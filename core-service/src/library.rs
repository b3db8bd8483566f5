//! In-memory library and playlist list shown by the UI.
//!
//! Persistence happens in the service; this type only keeps the ordering
//! rules in one place.

use core_library::models::{Playlist, PlaylistId, Track, TrackId};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct LibraryState {
    tracks: Vec<Track>,
    playlists: Vec<Playlist>,
}

impl LibraryState {
    pub fn new(tracks: Vec<Track>, playlists: Vec<Playlist>) -> Self {
        Self { tracks, playlists }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn find_track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    /// Put `track` at the front, replacing an older copy with the same id.
    pub fn prepend_track(&mut self, track: Track) {
        self.tracks.retain(|t| t.id != track.id);
        self.tracks.insert(0, track);
    }

    /// Append `track` unless a track with its id is already present.
    pub fn ensure_track(&mut self, track: &Track) -> bool {
        if self.find_track(&track.id).is_some() {
            return false;
        }
        self.tracks.push(track.clone());
        true
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, id: &PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| &p.id == id)
    }

    /// Built-in playlists first, then persisted ones whose ids do not
    /// collide with a built-in. Returns how many persisted playlists were kept.
    pub fn merge_playlists(&mut self, builtin: &[Playlist], persisted: Vec<Playlist>) -> usize {
        let builtin_ids: HashSet<&PlaylistId> = builtin.iter().map(|p| &p.id).collect();
        let extra: Vec<Playlist> = persisted
            .into_iter()
            .filter(|p| !builtin_ids.contains(&p.id))
            .collect();
        let kept = extra.len();

        self.playlists = builtin.to_vec();
        self.playlists.extend(extra);
        kept
    }

    /// Replace the playlist with the same id, or append it.
    pub fn upsert_playlist(&mut self, playlist: Playlist) {
        match self.playlists.iter_mut().find(|p| p.id == playlist.id) {
            Some(existing) => *existing = playlist,
            None => self.playlists.push(playlist),
        }
    }

    pub fn remove_playlist(&mut self, id: &PlaylistId) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| &p.id != id);
        self.playlists.len() != before
    }

    /// Tracks of a playlist in playlist order. Ids missing from the library
    /// are skipped.
    pub fn playlist_tracks(&self, id: &PlaylistId) -> Vec<Track> {
        self.playlist(id)
            .map(|playlist| {
                playlist
                    .track_ids
                    .iter()
                    .filter_map(|track_id| self.find_track(track_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
