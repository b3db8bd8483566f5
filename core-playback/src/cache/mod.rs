//! # Offline Cache Module
//!
//! Offline copies of tracks for playback without network access.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadOrchestrator               │
//! │  - download()                          │
//! │  - remove()                            │
//! │  - progress()                          │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> HttpClient (audio + cover fetch)
//!          ├──> OfflineTrackRepository (BlobStore)
//!          └──> CacheIndex (in-memory, authoritative)
//! ```
//!
//! The playback session subscribes to [`CacheIndex`] changes so a track that
//! finishes downloading while it streams can move to its local copy.

pub mod config;
pub mod index;
pub mod orchestrator;
pub mod progress;

pub use config::DownloadConfig;
pub use index::{CacheChange, CacheIndex};
pub use orchestrator::{DownloadOrchestrator, DownloadOutcome};
pub use progress::DownloadProgress;
