//! Catalog API client
//!
//! Read-only access to the music backend: search, genre charts, single
//! track lookup, lyrics and the radio directory. Transport is delegated to
//! the host [`HttpClient`].

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::{Lyrics, RadioStation, Track, TrackId};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

const BROWSER_WARNING_HEADER: &str = "tuna-skip-browser-warning";

/// Catalog operations consumed by the player.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Full-text search. `page` starts at 1.
    async fn search_tracks(&self, query: &str, limit: u32, page: u32) -> Result<Vec<Track>>;

    /// Tracks of a numeric genre chart.
    async fn genre_tracks(&self, genre_id: u32, limit: u32) -> Result<Vec<Track>>;

    async fn track(&self, id: &TrackId) -> Result<Track>;

    /// Lyrics for a track, `None` when the backend has none.
    async fn lyrics(&self, track_id: &TrackId, title: &str, artist: &str) -> Result<Option<Lyrics>>;

    async fn radio_stations(&self) -> Result<Vec<RadioStation>>;

    /// Backend liveness. Never fails; any error reads as unhealthy.
    async fn health(&self) -> bool;
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireTrack {
    id: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    url: String,
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireStation {
    id: String,
    name: String,
    #[serde(default)]
    genre: String,
    url: String,
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
struct WireLyrics {
    lyrics_text: Option<String>,
    lyrics: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    detail: Option<String>,
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// [`CatalogApi`] backed by the HTTP bridge.
pub struct HttpCatalogApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpCatalogApi {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.base_url, path)).header(BROWSER_WARNING_HEADER, "true")
    }

    /// Backend-relative URLs are served from the API host.
    fn absolute_url(&self, url: String) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url
        }
    }

    fn into_track(&self, wire: WireTrack) -> Track {
        Track {
            id: TrackId(wire.id),
            title: wire.title,
            artist: wire.artist,
            cover_url: wire.image,
            audio_url: self.absolute_url(wire.url),
            duration: wire.duration,
            is_local: false,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let response = self.http.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<WireError>()
            .ok()
            .and_then(|e| e.detail)
            .unwrap_or_else(|| format!("request to {} failed", url));
        warn!(status = response.status, %message, "Catalog request failed");
        Err(LibraryError::Api {
            status: response.status,
            message,
        })
    }

    async fn fetch_tracks(&self, request: HttpRequest) -> Result<Vec<Track>> {
        let response = self.send(request).await?;
        let listing: Listing<WireTrack> = response.json()?;
        Ok(listing
            .results
            .into_iter()
            .map(|wire| self.into_track(wire))
            .collect())
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    #[instrument(skip(self))]
    async fn search_tracks(&self, query: &str, limit: u32, page: u32) -> Result<Vec<Track>> {
        if query.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "query".to_string(),
                message: "search query cannot be empty".to_string(),
            });
        }

        let request = self
            .request("/api/search")
            .query("q", query)
            .query("limit", limit)
            .query("page", page.max(1));
        let tracks = self.fetch_tracks(request).await?;
        debug!(count = tracks.len(), "Search completed");
        Ok(tracks)
    }

    #[instrument(skip(self))]
    async fn genre_tracks(&self, genre_id: u32, limit: u32) -> Result<Vec<Track>> {
        let request = self
            .request(&format!("/api/genre/{}", genre_id))
            .query("limit", limit);
        self.fetch_tracks(request).await
    }

    #[instrument(skip(self), fields(track_id = %id))]
    async fn track(&self, id: &TrackId) -> Result<Track> {
        let response = self.send(self.request(&format!("/api/track/{}", id))).await?;
        let wire: WireTrack = response.json()?;
        Ok(self.into_track(wire))
    }

    #[instrument(skip(self, title, artist), fields(track_id = %track_id))]
    async fn lyrics(&self, track_id: &TrackId, title: &str, artist: &str) -> Result<Option<Lyrics>> {
        let request = self
            .request(&format!("/api/lyrics/{}", track_id))
            .query("title", title)
            .query("artist", artist);

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(LibraryError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let wire: WireLyrics = response.json()?;
        Ok(wire
            .lyrics_text
            .or(wire.lyrics)
            .filter(|text| !text.trim().is_empty())
            .map(|text| Lyrics {
                track_id: track_id.clone(),
                text,
            }))
    }

    #[instrument(skip(self))]
    async fn radio_stations(&self) -> Result<Vec<RadioStation>> {
        let response = self.send(self.request("/api/radio")).await?;
        let listing: Listing<WireStation> = response.json()?;
        Ok(listing
            .results
            .into_iter()
            .map(|s| RadioStation {
                id: s.id,
                name: s.name,
                genre: s.genre,
                url: s.url,
                image: s.image,
            })
            .collect())
    }

    async fn health(&self) -> bool {
        match self.http.execute(self.request("/health")).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                warn!(error = %e, "Health check failed");
                false
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::DownloadStream;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers every request with the next scripted response and records the request.
    #[derive(Default)]
    struct ScriptedHttp {
        responses: Mutex<Vec<bridge_traits::error::Result<HttpResponse>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        fn respond(status: u16, body: &str) -> Arc<Self> {
            let http = Self::default();
            http.responses.lock().unwrap().push(Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::from(body.to_string()),
            }));
            Arc::new(http)
        }

        fn failing() -> Arc<Self> {
            let http = Self::default();
            http.responses
                .lock()
                .unwrap()
                .push(Err(BridgeError::OperationFailed("connection refused".into())));
            Arc::new(http)
        }

        fn last_request(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            self.responses.lock().unwrap().remove(0)
        }

        async fn download_stream(&self, _url: String) -> bridge_traits::error::Result<DownloadStream> {
            Err(BridgeError::NotAvailable("not scripted".into()))
        }
    }

    const SEARCH_BODY: &str = r#"{
        "results": [
            {"id": "1", "title": "Rain", "artist": "Calm", "duration": 184, "url": "/stream/1", "image": "https://img/1.jpg"},
            {"id": "2", "title": "Snow", "artist": "Calm", "duration": 201, "url": "https://cdn/2.mp3", "image": ""}
        ],
        "count": 2
    }"#;

    #[tokio::test]
    async fn test_search_maps_wire_tracks() {
        let http = ScriptedHttp::respond(200, SEARCH_BODY);
        let api = HttpCatalogApi::new(http.clone(), "https://api.example.com/");

        let tracks = api.search_tracks("rain", 20, 1).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].audio_url, "https://api.example.com/stream/1");
        assert_eq!(tracks[0].cover_url, "https://img/1.jpg");
        assert_eq!(tracks[1].audio_url, "https://cdn/2.mp3");
        assert!(tracks.iter().all(|t| !t.is_local));

        let request = http.last_request();
        assert_eq!(request.url, "https://api.example.com/api/search");
        assert_eq!(
            request.query,
            vec![
                ("q".to_string(), "rain".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("page".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(
            request.headers.get(BROWSER_WARNING_HEADER).map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_request() {
        let http = Arc::new(ScriptedHttp::default());
        let api = HttpCatalogApi::new(http.clone(), "https://api.example.com");

        let err = api.search_tracks("  ", 20, 1).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
        assert!(http.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let http = ScriptedHttp::respond(502, r#"{"detail": "upstream unavailable"}"#);
        let api = HttpCatalogApi::new(http, "https://api.example.com");

        match api.genre_tracks(7, 20).await {
            Err(LibraryError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_genre_path_and_limit() {
        let http = ScriptedHttp::respond(200, r#"{"results": []}"#);
        let api = HttpCatalogApi::new(http.clone(), "https://api.example.com");

        assert!(api.genre_tracks(12, 5).await.unwrap().is_empty());
        let request = http.last_request();
        assert_eq!(request.url, "https://api.example.com/api/genre/12");
        assert_eq!(request.query, vec![("limit".to_string(), "5".to_string())]);
    }

    #[tokio::test]
    async fn test_lyrics_prefers_lyrics_text_and_maps_404_to_none() {
        let http = ScriptedHttp::respond(200, r#"{"lyrics_text": "la la", "lyrics": "other"}"#);
        let api = HttpCatalogApi::new(http, "https://api.example.com");
        let lyrics = api
            .lyrics(&TrackId::from("9"), "Song", "Band")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lyrics.text, "la la");

        let http = ScriptedHttp::respond(404, r#"{"detail": "not found"}"#);
        let api = HttpCatalogApi::new(http, "https://api.example.com");
        assert!(api
            .lyrics(&TrackId::from("9"), "Song", "Band")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_radio_directory() {
        let http = ScriptedHttp::respond(
            200,
            r#"{"results": [{"id": "r1", "name": "Jazz FM", "genre": "jazz", "url": "https://stream/jazz", "image": "https://img/jazz.png"}]}"#,
        );
        let api = HttpCatalogApi::new(http, "https://api.example.com");

        let stations = api.radio_stations().await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Jazz FM");
        assert_eq!(stations[0].url, "https://stream/jazz");
    }

    #[tokio::test]
    async fn test_health_never_errors() {
        let api = HttpCatalogApi::new(ScriptedHttp::respond(200, "{}"), "https://api.example.com");
        assert!(api.health().await);

        let api = HttpCatalogApi::new(ScriptedHttp::failing(), "https://api.example.com");
        assert!(!api.health().await);
    }
}
