//! # Library Module
//!
//! Catalog access and persisted user data.
//!
//! ## Overview
//!
//! This module provides:
//! - Domain models shared by the rest of the core (tracks, stations, playlists)
//! - The catalog API client (search, genres, lyrics, radio directory)
//! - Repositories for offline track copies and user playlists on top of the
//!   host blob store

pub mod catalog;
pub mod error;
pub mod models;
pub mod repositories;

pub use catalog::{CatalogApi, HttpCatalogApi};
pub use error::{LibraryError, Result};
pub use models::{
    format_duration, Lyrics, PersistedTrack, Playlist, PlaylistId, RadioStation, Track, TrackId,
};
pub use repositories::{
    BlobOfflineTrackRepository, BlobPlaylistRepository, OfflineTrackRepository,
    PlaylistRepository,
};
