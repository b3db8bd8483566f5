//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::MemoryBlobStore;
use bridge_traits::blob_store::{BlobRecord, BlobStore};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{DownloadStream, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{AudioOutput, AudioSource, BufferHandle};
use bytes::Bytes;
use core_library::models::Track;
use core_runtime::events::CoreEvent;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Semaphore;

// ============================================================================
// Gate
// ============================================================================

/// Closed until opened; each opening lets `n` waiters through.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self, n: usize) {
        self.0.add_permits(n);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

// ============================================================================
// Audio output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(AudioSource),
    Play,
    Pause,
    Seek(Duration),
}

/// Records every command and tracks live buffers.
#[derive(Default)]
pub struct RecordingOutput {
    commands: Mutex<Vec<Command>>,
    live_buffers: Mutex<HashSet<BufferHandle>>,
    next_handle: AtomicU64,
    load_attempts: AtomicU64,
    fail_loads: Mutex<bool>,
    load_gate: Mutex<Option<Gate>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    pub fn loads(&self) -> Vec<AudioSource> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::Load(source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_load(&self) -> Option<AudioSource> {
        self.loads().pop()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.lock().len()
    }

    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        *self.fail_loads.lock() = fail;
    }

    pub fn gate_loads(&self, gate: Option<Gate>) {
        *self.load_gate.lock() = gate;
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn load(&self, source: &AudioSource) -> Result<()> {
        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        let gate = self.load_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if *self.fail_loads.lock() {
            return Err(BridgeError::OperationFailed("unsupported format".into()));
        }
        self.commands.lock().push(Command::Load(source.clone()));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.commands.lock().push(Command::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.commands.lock().push(Command::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.commands.lock().push(Command::Seek(position));
        Ok(())
    }

    fn register_buffer(&self, _data: Bytes) -> Result<BufferHandle> {
        let handle = BufferHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.live_buffers.lock().insert(handle);
        Ok(handle)
    }

    fn release_buffer(&self, handle: BufferHandle) {
        self.live_buffers.lock().remove(&handle);
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Clone)]
pub enum StreamPlan {
    Body {
        chunks: Vec<Bytes>,
        content_length: Option<u64>,
    },
    Status(u16),
    Refused,
    /// Delivers the chunks, then the connection drops.
    BreaksAfter(Vec<Bytes>),
    /// Never yields a chunk.
    Hangs,
}

impl StreamPlan {
    pub fn audio(payload: &'static [u8], chunk: usize) -> Self {
        StreamPlan::Body {
            chunks: payload.chunks(chunk).map(Bytes::from_static).collect(),
            content_length: Some(payload.len() as u64),
        }
    }
}

/// Serves scripted streams and cover responses by URL.
#[derive(Default)]
pub struct FakeHttp {
    streams: Mutex<HashMap<String, StreamPlan>>,
    responses: Mutex<HashMap<String, std::result::Result<(u16, Bytes), String>>>,
    requests: Mutex<Vec<String>>,
    stream_gate: Mutex<Option<Gate>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stream(&self, url: &str, plan: StreamPlan) {
        self.streams.lock().insert(url.to_string(), plan);
    }

    pub fn respond(&self, url: &str, status: u16, body: &'static [u8]) {
        self.responses
            .lock()
            .insert(url.to_string(), Ok((status, Bytes::from_static(body))));
    }

    pub fn refuse(&self, url: &str) {
        self.responses
            .lock()
            .insert(url.to_string(), Err("connection refused".to_string()));
    }

    pub fn gate_streams(&self, gate: Option<Gate>) {
        *self.stream_gate.lock() = gate;
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn requested(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.url.clone());
        let planned = self.responses.lock().get(&request.url).cloned();
        match planned {
            Some(Ok((status, body))) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body,
            }),
            Some(Err(message)) => Err(BridgeError::OperationFailed(message)),
            None => Ok(HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
        }
    }

    async fn download_stream(&self, url: String) -> Result<DownloadStream> {
        self.requests.lock().push(url.clone());
        let gate = self.stream_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let plan = self
            .streams
            .lock()
            .get(&url)
            .cloned()
            .unwrap_or(StreamPlan::Status(404));

        let (status, content_length, chunks): (u16, Option<u64>, BoxStream<'static, Result<Bytes>>) = match plan {
            StreamPlan::Body {
                chunks,
                content_length,
            } => (200, content_length, stream::iter(chunks.into_iter().map(Ok)).boxed()),
            StreamPlan::Status(status) => (status, None, stream::empty().boxed()),
            StreamPlan::Refused => {
                return Err(BridgeError::OperationFailed("connection refused".into()))
            }
            StreamPlan::BreaksAfter(chunks) => {
                let broken = stream::iter(
                    chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(BridgeError::OperationFailed(
                            "connection reset".into(),
                        )))),
                );
                (200, None, broken.boxed())
            }
            StreamPlan::Hangs => (200, None, stream::pending().boxed()),
        };

        Ok(DownloadStream {
            status,
            content_length,
            chunks,
        })
    }
}

// ============================================================================
// Blob store
// ============================================================================

/// Memory store whose reads wait on a gate while one is set.
#[derive(Default)]
pub struct GatedBlobStore {
    inner: MemoryBlobStore,
    read_gate: Mutex<Option<Gate>>,
}

impl GatedBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gate_reads(&self, gate: Option<Gate>) {
        *self.read_gate.lock() = gate;
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.inner.count(collection).await
    }
}

#[async_trait]
impl BlobStore for GatedBlobStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<BlobRecord>> {
        let gate = self.read_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: &str, record: BlobRecord) -> Result<()> {
        self.inner.put(collection, record).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        self.inner.delete(collection, key).await
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<BlobRecord>> {
        self.inner.list_all(collection).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn track(id: &str) -> Track {
    Track::new(
        id,
        format!("Track {}", id),
        "Artist",
        format!("https://cdn.example.com/{}.mp3", id),
        200,
    )
    .with_cover(format!("https://img.example.com/{}.jpg", id))
}

pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Yield until `condition` holds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
