//! # Event Bus System
//!
//! Typed events for the player core over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain, wrapped in [`CoreEvent`]
//! - **EventBus**: broadcast channel shared by every publisher
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Playback Session ├────────>│           ├────────────>│  UI layer  │
//! └──────────────────┘         │ EventBus  │             └────────────┘
//! ┌──────────────────┐  emit   │ (broadcast│  subscribe  ┌────────────┐
//! │ Download Orch.   ├────────>│  channel) ├────────────>│   Logger   │
//! └──────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Started {
//!     track_id: "t-1".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Download started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.
//!
//! Publishers ignore `SendError`: having no subscriber is normal.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport and target changes of the playback session
    Playback(PlaybackEvent),
    /// Offline download lifecycle
    Download(DownloadEvent),
    /// Library and playlist changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::TargetChanged { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::QueueEnded { .. }) => EventSeverity::Info,
            CoreEvent::Library(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// What kind of target the session is playing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetKind {
    Track,
    Radio,
}

/// Events related to the playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track or station became the playback target.
    TargetChanged {
        kind: TargetKind,
        /// Track id or station id.
        id: String,
        /// Track title or station name.
        title: String,
    },
    /// The output started playing the current target.
    Started { id: String },
    Paused {
        id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    Resumed {
        id: String,
        position_ms: u64,
    },
    Seeked {
        id: String,
        position_ms: u64,
    },
    /// The current track moved from its remote stream to a local copy.
    SourceSwapped {
        track_id: String,
        /// Position carried across the swap (milliseconds).
        position_ms: u64,
    },
    /// The current track played to its natural end.
    Completed { track_id: String },
    /// Completion found no next track; the session is paused at zero.
    QueueEnded { track_id: String },
    /// Source load or output failure. Playback stays on the current target.
    Error {
        id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TargetChanged { .. } => "Playback target changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::SourceSwapped { .. } => "Switched to local source",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::QueueEnded { .. } => "Queue ended",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events related to offline downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Started { track_id: String },
    /// Monotonic progress in percent (0-100).
    Progress { track_id: String, percent: u8 },
    Completed {
        track_id: String,
        /// Whether a cover payload was stored alongside the audio.
        has_cover: bool,
    },
    Failed { track_id: String, message: String },
    /// The offline copy was deleted.
    Removed { track_id: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Removed { .. } => "Download removed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to the in-memory library and persisted playlists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TrackAdded { track_id: String, title: String },
    PlaylistCreated { playlist_id: String, name: String },
    PlaylistUpdated {
        playlist_id: String,
        track_count: usize,
    },
    PlaylistDeleted { playlist_id: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackAdded { .. } => "Track added to library",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Clone it freely; clones share the same channel. Slow subscribers get
/// `RecvError::Lagged` instead of blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Convenience for `EventStream::new(self.subscribe())`.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::new(100);
/// let downloads = bus.stream().filter(|e| matches!(e, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind, `RecvError::Closed`
    /// once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
