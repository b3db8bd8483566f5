//! # Host Bridge Traits
//!
//! Capabilities the player core needs from its host, expressed as traits.
//!
//! ## Traits
//!
//! - [`BlobStore`](blob_store::BlobStore) - Durable records with binary attachments
//!   (offline tracks, playlists)
//! - [`HttpClient`](http::HttpClient) - Catalog requests and streamed payload downloads
//! - [`AudioOutput`](playback::AudioOutput) - The single host audio element
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Provides |
//! |----------|---------------------|----------|
//! | Desktop  | `bridge-desktop`    | `HttpClient`, `BlobStore` |
//! | Mobile   | host app            | all traits, `AudioOutput` always |
//!
//! `AudioOutput` is never defaulted: it wraps a real audio element that only
//! the host can provide.
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Adapters
//! convert platform errors into it and keep the message actionable (include
//! the path, URL, or key involved).
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared
//! across tokio tasks behind an `Arc`.

pub mod blob_store;
pub mod error;
pub mod http;
pub mod playback;
pub mod time;

pub use error::BridgeError;

pub use blob_store::{BlobRecord, BlobStore};
pub use http::{DownloadStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{AudioOutput, AudioSource, BufferHandle, OutputEvent};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
