//! Blob store implementations backed by the local file system and memory.

use async_trait::async_trait;
use bridge_traits::{
    blob_store::{BlobRecord, BlobStore},
    error::{BridgeError, Result},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const MANIFEST_FILE: &str = "record.json";
const METADATA_FILE: &str = "metadata.json";
const ATTACHMENT_EXT: &str = "bin";
/// Longest directory name produced by hex encoding; longer keys are hashed
/// to stay under common 255-byte file name limits.
const MAX_ENCODED_KEY_LEN: usize = 200;

/// On-disk description of a record directory.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    key: String,
    saved_at: i64,
    attachments: Vec<String>,
}

/// File-system blob store
///
/// Layout: `<root>/<collection>/<hex(key)>/` (or `h<sha256(key)>` for long
/// keys; the original key lives in the manifest) holding `record.json`,
/// `metadata.json`, and one `<name>.bin` per attachment. A record is written
/// into a staging directory and renamed into place, so readers never observe
/// a half-written record.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Store rooted in the platform data directory.
    pub fn new() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("mini-player")
            .join("blobs");

        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn record_dir(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection).join(encode_key(key))
    }

    async fn read_manifest(dir: &Path) -> Result<Manifest> {
        let raw = fs::read(dir.join(MANIFEST_FILE)).await?;
        serde_json::from_slice(&raw).map_err(|e| {
            BridgeError::Storage(format!("Corrupt manifest in {}: {}", dir.display(), e))
        })
    }

    async fn read_record(dir: &Path, with_attachments: bool) -> Result<BlobRecord> {
        let manifest = Self::read_manifest(dir).await?;
        let metadata = Bytes::from(fs::read(dir.join(METADATA_FILE)).await?);
        let mut record = BlobRecord::new(manifest.key, metadata, manifest.saved_at);

        if with_attachments {
            for name in manifest.attachments {
                let path = dir.join(format!("{}.{}", name, ATTACHMENT_EXT));
                let data = fs::read(&path).await?;
                record.attachments.insert(name, Bytes::from(data));
            }
        }

        Ok(record)
    }
}

impl Default for FsBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<BlobRecord>> {
        let dir = self.record_dir(collection, key);
        if !fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Ok(None);
        }
        Self::read_record(&dir, true).await.map(Some)
    }

    async fn put(&self, collection: &str, record: BlobRecord) -> Result<()> {
        let target = self.record_dir(collection, &record.key);
        let staging = target.with_extension("staging");

        if fs::try_exists(&staging).await? {
            fs::remove_dir_all(&staging).await?;
        }
        fs::create_dir_all(&staging).await?;

        let manifest = Manifest {
            key: record.key.clone(),
            saved_at: record.saved_at,
            attachments: record.attachments.keys().cloned().collect(),
        };
        let manifest = serde_json::to_vec(&manifest)
            .map_err(|e| BridgeError::Storage(format!("Failed to encode manifest: {}", e)))?;

        fs::write(staging.join(METADATA_FILE), &record.metadata).await?;
        for (name, data) in &record.attachments {
            fs::write(staging.join(format!("{}.{}", name, ATTACHMENT_EXT)), data).await?;
        }
        // Manifest last: its presence marks the record complete.
        fs::write(staging.join(MANIFEST_FILE), manifest).await?;

        if fs::try_exists(&target).await? {
            fs::remove_dir_all(&target).await?;
        }
        fs::rename(&staging, &target).await?;

        debug!(collection, key = %record.key, "Stored blob record");
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        let dir = self.record_dir(collection, key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(collection, key, "Deleted blob record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<BlobRecord>> {
        let dir = self.collection_dir(collection);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some() || !entry.file_type().await?.is_dir() {
                continue;
            }
            match Self::read_record(&path, false).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        records.sort_by_key(|r| r.saved_at);
        Ok(records)
    }
}

fn encode_key(key: &str) -> String {
    if key.len() * 2 <= MAX_ENCODED_KEY_LEN {
        return hex(key.as_bytes());
    }
    // 'h' never appears in hex output, so hashed names cannot collide with encoded ones
    format!("h{}", hex(&Sha256::digest(key.as_bytes())))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Volatile blob store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    collections: RwLock<HashMap<String, HashMap<String, BlobRecord>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<BlobRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, record: BlobRecord) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        if let Some(c) = self.collections.write().await.get_mut(collection) {
            c.remove(key);
        }
        Ok(())
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<BlobRecord>> {
        let guard = self.collections.read().await;
        let mut records: Vec<BlobRecord> = guard
            .get(collection)
            .map(|c| {
                c.values()
                    .map(|r| BlobRecord::new(r.key.clone(), r.metadata.clone(), r.saved_at))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|r| r.saved_at);
        Ok(records)
    }
}
