//! Domain models for the player library
//!
//! Tracks and stations come from the catalog API; playlists and offline
//! copies are persisted through the blob store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Catalog identifier of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a user playlist
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id derived from a creation timestamp (milliseconds).
    pub fn from_timestamp(millis: i64) -> Self {
        Self(millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A streamable, downloadable audio item.
///
/// Tracks are immutable once built. A locally cached cover is not written
/// back into `cover_url`; readers resolve it separately by track id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    /// Remote cover image URL
    pub cover_url: String,
    /// Remote audio URL
    pub audio_url: String,
    /// Duration in whole seconds
    pub duration: u32,
    /// Hint that an offline copy existed when this value was produced.
    /// The cache index is authoritative.
    #[serde(default)]
    pub is_local: bool,
}

impl Track {
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_url: impl Into<String>,
        duration: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover_url: String::new(),
            audio_url: audio_url.into(),
            duration,
            is_local: false,
        }
    }

    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    /// Copy of this track flagged as available offline.
    pub fn as_local(&self) -> Self {
        Self {
            is_local: true,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        if self.audio_url.trim().is_empty() {
            return Err(format!("Track {} has no audio URL", self.id));
        }

        Ok(())
    }
}

/// An internet radio station. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStation {
    pub id: String,
    pub name: String,
    pub genre: String,
    /// Stream URL
    pub url: String,
    /// Station artwork URL
    pub image: String,
}

impl RadioStation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genre: String::new(),
            url: url.into(),
            image: String::new(),
        }
    }
}

/// User playlist. Track ids are unique within a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub cover_url: String,
    pub track_ids: Vec<TrackId>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl Playlist {
    pub fn new(id: PlaylistId, name: impl Into<String>, cover_url: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            name: name.into(),
            cover_url: cover_url.into(),
            track_ids: Vec::new(),
            created_at,
        }
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.track_ids.contains(track_id)
    }

    /// Appends `track_id` unless already present. Returns whether it was added.
    pub fn add_track(&mut self, track_id: TrackId) -> bool {
        if self.contains(&track_id) {
            return false;
        }
        self.track_ids.push(track_id);
        true
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Offline copy of a track as stored in the blob store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTrack {
    pub track: Track,
    pub audio: Bytes,
    pub cover: Option<Bytes>,
    /// Milliseconds since the Unix epoch
    pub saved_at: i64,
}

/// Lyrics text for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    pub track_id: TrackId,
    pub text: String,
}

impl Lyrics {
    /// Check if lyrics carry LRC timestamps
    pub fn is_lrc_format(&self) -> bool {
        self.text
            .lines()
            .any(|line| line.starts_with('[') && line.contains(':') && line.contains(']'))
    }
}

/// Format a duration in seconds as `m:ss`.
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// =============================================================================
// Tests
// =============================================================================
