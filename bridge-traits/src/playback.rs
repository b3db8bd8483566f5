//! Audio output bridge.
//!
//! The host owns exactly one audio element (a media player, an `<audio>` tag,
//! a native engine). The core drives it through [`AudioOutput`] and the host
//! reports progress back as [`OutputEvent`]s.
//!
//! Locally cached payloads are handed to the host as in-memory buffers. The
//! host hands back an opaque [`BufferHandle`] that stays valid until it is
//! released, the same lifecycle as a browser object URL.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Opaque handle to a buffer registered with the audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer:{}", self.0)
    }
}

/// What the audio output should play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Remote HTTP(S) URL streamed by the host.
    Remote { url: String },
    /// Buffer previously registered through [`AudioOutput::register_buffer`].
    Buffer { handle: BufferHandle },
}

impl AudioSource {
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::Remote { url: url.into() }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::Remote { .. })
    }
}

/// Notifications raised by the host audio element.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Periodic position report while playing.
    TimeUpdate { position: Duration },
    /// Metadata for the loaded source has been read.
    DurationKnown { duration: Duration },
    /// The loaded source played to its natural end.
    Ended,
    /// The host failed to load or decode the source.
    Error { message: String },
}

/// The single audio output owned by the playback session.
///
/// Transport calls are async because hosts may need to hop threads. Buffer
/// registration is synchronous so a handle can be released from `Drop`.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Replace the current source. Position resets to zero and the output
    /// stays paused until [`play`](Self::play) is called.
    async fn load(&self, source: &AudioSource) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Jump to an absolute position in the loaded source.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Hand a complete audio payload to the host.
    fn register_buffer(&self, data: Bytes) -> Result<BufferHandle>;

    /// Release a registered buffer. Releasing an unknown handle is a no-op.
    fn release_buffer(&self, handle: BufferHandle);
}
