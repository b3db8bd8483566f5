//! # Desktop Bridge Implementations
//!
//! Default bridge adapters for desktop hosts (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `BlobStore` using `tokio::fs` under the platform data directory
//! - `MemoryBlobStore` for tests and sessions that should not persist
//!
//! `AudioOutput` has no desktop default; the host wires in its own player.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsBlobStore, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let blob_store = FsBlobStore::with_root("/tmp/mini-player");
//! ```

mod blob_store;
mod http;

pub use blob_store::{FsBlobStore, MemoryBlobStore};
pub use http::ReqwestHttpClient;
