//! # Repositories
//!
//! Persistence of user data on top of the host [`BlobStore`].
//!
//! - `OfflineTrackRepository` - downloaded tracks with their audio and cover payloads
//! - `PlaylistRepository` - user playlists
//!
//! [`BlobStore`]: bridge_traits::blob_store::BlobStore

pub mod playlist;
pub mod track;

pub use playlist::{BlobPlaylistRepository, PlaylistRepository, PLAYLISTS_COLLECTION};
pub use track::{BlobOfflineTrackRepository, OfflineTrackRepository, TRACKS_COLLECTION};
