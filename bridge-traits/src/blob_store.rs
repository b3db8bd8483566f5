//! Blob Store Abstraction
//!
//! Durable key-value storage for structured metadata with optional binary
//! attachments. The core keeps offline tracks (metadata plus audio and cover
//! payloads) and playlists here. How records are laid out on disk is the
//! implementation's business.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// A single stored record.
///
/// `metadata` is an opaque JSON document owned by the caller; `attachments`
/// hold named binary payloads (for example `"audio"` and `"cover"`).
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRecord {
    pub key: String,
    pub metadata: Bytes,
    pub attachments: HashMap<String, Bytes>,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
}

impl BlobRecord {
    pub fn new(key: impl Into<String>, metadata: Bytes, saved_at: i64) -> Self {
        Self {
            key: key.into(),
            metadata,
            attachments: HashMap::new(),
            saved_at,
        }
    }

    /// Build a record whose metadata is the JSON encoding of `value`.
    pub fn from_json<T: Serialize>(key: impl Into<String>, value: &T, saved_at: i64) -> Result<Self> {
        let metadata = serde_json::to_vec(value).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        Ok(Self::new(key, Bytes::from(metadata), saved_at))
    }

    pub fn with_attachment(mut self, name: impl Into<String>, data: Bytes) -> Self {
        self.attachments.insert(name.into(), data);
        self
    }

    pub fn attachment(&self, name: &str) -> Option<&Bytes> {
        self.attachments.get(name)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.metadata).map_err(|e| {
            BridgeError::OperationFailed(format!(
                "Corrupt metadata for record '{}': {}",
                self.key, e
            ))
        })
    }
}

/// Blob store trait
///
/// Provides read-after-write consistency per key. No transactional guarantees
/// across keys are expected.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::blob_store::{BlobRecord, BlobStore};
///
/// async fn remember(store: &dyn BlobStore, id: &str) -> Result<()> {
///     let record = BlobRecord::from_json(id, &serde_json::json!({ "id": id }), 0)?;
///     store.put("tracks", record).await
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a record with all of its attachments.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<BlobRecord>>;

    /// Insert or replace the record stored under `record.key`.
    async fn put(&self, collection: &str, record: BlobRecord) -> Result<()>;

    /// Remove a record. Deleting a missing key succeeds.
    async fn delete(&self, collection: &str, key: &str) -> Result<()>;

    /// List every record in a collection, oldest `saved_at` first.
    ///
    /// Attachments are not loaded; returned records carry metadata only.
    async fn list_all(&self, collection: &str) -> Result<Vec<BlobRecord>>;
}
