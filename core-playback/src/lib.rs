//! # Playback Module
//!
//! The media playback session and the offline track cache.
//!
//! ## Overview
//!
//! This module handles:
//! - The cache index of tracks playable offline
//! - Downloading and persisting tracks (`DownloadOrchestrator`)
//! - Queue navigation under repeat and shuffle policies
//! - Source resolution between remote streams and local copies
//! - The playback session state machine driving the host audio output

pub mod cache;
pub mod config;
pub mod error;
pub mod queue;
pub mod session;
pub mod source;

pub use cache::{CacheChange, CacheIndex, DownloadConfig, DownloadOrchestrator, DownloadOutcome};
pub use config::SessionConfig;
pub use error::{PlaybackError, Result};
pub use queue::{NextStep, PlayQueue, PrevStep, RepeatMode};
pub use session::{PlaybackPhase, PlaybackSession, PlaybackSnapshot, PlaybackTarget};
pub use source::{CoverArt, CoverOverrides, ResolvedSource, SourceOrigin, SourceResolver};
