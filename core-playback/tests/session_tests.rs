//! Playback session scenarios driven through a recording audio output.

mod common;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{AudioOutput, AudioSource, BufferHandle, OutputEvent};
use bytes::Bytes;
use common::{drain, track, wait_until, Command, Gate, GatedBlobStore, RecordingOutput};
use core_library::models::{PersistedTrack, RadioStation, Track};
use core_library::repositories::{BlobOfflineTrackRepository, OfflineTrackRepository};
use core_playback::{
    CacheChange, CacheIndex, CoverArt, PlaybackError, PlaybackPhase, PlaybackSession, PlaybackTarget,
    RepeatMode, SessionConfig, SourceResolver,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use mockall::mock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    output: Arc<RecordingOutput>,
    store: Arc<GatedBlobStore>,
    tracks: Arc<BlobOfflineTrackRepository>,
    index: Arc<CacheIndex>,
    bus: EventBus,
    session: Arc<PlaybackSession>,
}

impl Fixture {
    fn new() -> Self {
        let output = RecordingOutput::new();
        let store = GatedBlobStore::new();
        let tracks = Arc::new(BlobOfflineTrackRepository::new(store.clone()));
        let index = Arc::new(CacheIndex::new());
        let bus = EventBus::new(256);
        let resolver = SourceResolver::new(index.clone(), tracks.clone(), output.clone());
        let session = PlaybackSession::new(SessionConfig::default(), output.clone(), resolver)
            .unwrap()
            .with_event_bus(bus.clone())
            .with_rng(StdRng::seed_from_u64(7));

        Self {
            output,
            store,
            tracks,
            index,
            bus,
            session: Arc::new(session),
        }
    }

    async fn store_offline(&self, t: &Track, cover: Option<&'static [u8]>) {
        self.tracks
            .save(PersistedTrack {
                track: t.clone(),
                audio: Bytes::from_static(b"offline-audio"),
                cover: cover.map(Bytes::from_static),
                saved_at: 1,
            })
            .await
            .unwrap();
    }

    async fn cache(&self, t: &Track) {
        self.store_offline(t, Some(b"cover-bytes")).await;
        self.index.add(t.id.clone());
    }

    async fn time(&self, secs: u64) {
        self.session
            .handle_output_event(OutputEvent::TimeUpdate {
                position: Duration::from_secs(secs),
            })
            .await
            .unwrap();
    }

    async fn ended(&self) {
        self.session.handle_output_event(OutputEvent::Ended).await.unwrap();
    }

    fn current_id(&self) -> Option<String> {
        self.session.current_track().map(|t| t.id.to_string())
    }
}

fn remote(t: &Track) -> AudioSource {
    AudioSource::remote(t.audio_url.clone())
}

fn playback_events(events: Vec<CoreEvent>) -> Vec<PlaybackEvent> {
    events
        .into_iter()
        .filter_map(|e| match e {
            CoreEvent::Playback(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

// ============================================================================
// Starting playback
// ============================================================================

#[tokio::test]
async fn test_uncached_track_streams_remote_url() {
    let f = Fixture::new();
    let mut rx = f.bus.subscribe();
    let queue = tracks(&["a", "b"]);

    f.session.play_track(queue[0].clone(), Some(queue.clone())).await.unwrap();

    assert_eq!(f.output.commands(), vec![Command::Load(remote(&queue[0])), Command::Play]);
    let snapshot = f.session.snapshot();
    assert_eq!(snapshot.phase, PlaybackPhase::Playing);
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.duration, Duration::from_secs(200));
    assert_eq!(snapshot.queue_len, 2);
    assert_eq!(
        f.session.display_cover(),
        Some(CoverArt::Remote("https://img.example.com/a.jpg".into()))
    );

    let events = playback_events(drain(&mut rx));
    assert!(matches!(events.first(), Some(PlaybackEvent::TargetChanged { id, .. }) if id == "a"));
    assert_eq!(events.last(), Some(&PlaybackEvent::Started { id: "a".into() }));
}

#[tokio::test]
async fn test_cached_track_plays_from_buffer_with_stored_cover() {
    let f = Fixture::new();
    let a = track("a");
    f.cache(&a).await;

    f.session.play_track(a.clone(), None).await.unwrap();

    assert!(matches!(f.output.last_load(), Some(AudioSource::Buffer { .. })));
    assert_eq!(f.output.live_buffers(), 1);
    assert_eq!(
        f.session.display_cover(),
        Some(CoverArt::Local(Bytes::from_static(b"cover-bytes")))
    );
    // the track itself keeps its remote cover URL
    assert_eq!(f.session.current_track().unwrap().cover_url, a.cover_url);
}

#[tokio::test]
async fn test_indexed_track_without_record_falls_back_to_remote() {
    let f = Fixture::new();
    let a = track("a");
    f.index.add(a.id.clone());

    f.session.play_track(a.clone(), None).await.unwrap();

    assert_eq!(f.output.last_load(), Some(remote(&a)));
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Playing);
    assert_eq!(f.output.live_buffers(), 0);
}

#[tokio::test]
async fn test_switching_targets_releases_buffers() {
    let f = Fixture::new();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    f.cache(&a).await;
    f.cache(&b).await;

    f.session.play_track(a, None).await.unwrap();
    assert_eq!(f.output.live_buffers(), 1);
    f.session.play_track(b, None).await.unwrap();
    assert_eq!(f.output.live_buffers(), 1);
    f.session.play_track(c, None).await.unwrap();
    assert_eq!(f.output.live_buffers(), 0);
}

#[tokio::test]
async fn test_replaying_current_track_keeps_position() {
    let f = Fixture::new();
    let a = track("a");
    f.session.play_track(a.clone(), None).await.unwrap();
    f.time(30).await;
    f.session.toggle_play().await.unwrap();
    f.output.clear();

    f.session.play_track(a, None).await.unwrap();

    assert_eq!(f.output.commands(), vec![Command::Play]);
    let snapshot = f.session.snapshot();
    assert_eq!(snapshot.position, Duration::from_secs(30));
    assert!(snapshot.is_playing);
}

#[tokio::test]
async fn test_load_failure_parks_the_session() {
    let f = Fixture::new();
    let mut rx = f.bus.subscribe();
    f.output.fail_loads(true);
    let queue = tracks(&["a", "b"]);

    f.session.play_track(queue[0].clone(), Some(queue)).await.unwrap();

    let snapshot = f.session.snapshot();
    assert_eq!(snapshot.phase, PlaybackPhase::Paused);
    assert!(!snapshot.is_playing);
    assert_eq!(f.current_id().as_deref(), Some("a"));
    assert!(!f.output.commands().contains(&Command::Play));
    assert!(playback_events(drain(&mut rx))
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Error { id: Some(id), .. } if id == "a")));
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_idle_session_ignores_transport() {
    let f = Fixture::new();

    assert!(!f.session.toggle_play().await.unwrap());
    assert!(matches!(
        f.session.seek(Duration::from_secs(5)).await,
        Err(PlaybackError::NoTargetLoaded)
    ));
    f.session.next().await.unwrap();
    f.session.prev().await.unwrap();
    f.ended().await;

    assert!(f.output.commands().is_empty());
    assert_eq!(f.session.snapshot().target, PlaybackTarget::Idle);
}

#[tokio::test]
async fn test_toggle_pauses_and_resumes() {
    let f = Fixture::new();
    f.session.play_track(track("a"), None).await.unwrap();
    f.time(12).await;
    let mut rx = f.bus.subscribe();
    f.output.clear();

    assert!(!f.session.toggle_play().await.unwrap());
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Paused);
    assert!(f.session.toggle_play().await.unwrap());
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Playing);

    assert_eq!(f.output.commands(), vec![Command::Pause, Command::Play]);
    assert_eq!(
        playback_events(drain(&mut rx)),
        vec![
            PlaybackEvent::Paused {
                id: "a".into(),
                position_ms: 12_000
            },
            PlaybackEvent::Resumed {
                id: "a".into(),
                position_ms: 12_000
            },
        ]
    );
}

#[tokio::test]
async fn test_seek_clamps_to_duration() {
    let f = Fixture::new();
    f.session.play_track(track("a"), None).await.unwrap();

    let applied = f.session.seek(Duration::from_secs(500)).await.unwrap();
    assert_eq!(applied, Duration::from_secs(200));

    f.session
        .handle_output_event(OutputEvent::DurationKnown {
            duration: Duration::from_secs(180),
        })
        .await
        .unwrap();
    let applied = f.session.seek(Duration::from_secs(190)).await.unwrap();
    assert_eq!(applied, Duration::from_secs(180));
    assert_eq!(f.output.commands().last(), Some(&Command::Seek(Duration::from_secs(180))));
    assert_eq!(f.session.snapshot().position, Duration::from_secs(180));
}

#[tokio::test]
async fn test_prev_restarts_after_threshold() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[1].clone(), Some(queue)).await.unwrap();
    f.time(10).await;
    f.output.clear();

    f.session.prev().await.unwrap();

    assert_eq!(f.output.commands(), vec![Command::Seek(Duration::ZERO)]);
    assert_eq!(f.current_id().as_deref(), Some("b"));
}

#[tokio::test]
async fn test_prev_wraps_to_last_track() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b", "c"]);
    f.session.play_track(queue[0].clone(), Some(queue.clone())).await.unwrap();
    f.time(2).await;

    f.session.prev().await.unwrap();

    assert_eq!(f.current_id().as_deref(), Some("c"));
    assert_eq!(f.output.last_load(), Some(remote(&queue[2])));
}

#[tokio::test]
async fn test_next_from_track_outside_queue_stops() {
    let f = Fixture::new();
    let mut rx = f.bus.subscribe();
    f.session.set_queue(tracks(&["a", "b"]));
    f.session.play_track(track("x"), None).await.unwrap();
    f.time(50).await;

    f.session.next().await.unwrap();

    let snapshot = f.session.snapshot();
    assert_eq!(f.current_id().as_deref(), Some("x"));
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.position, Duration::ZERO);
    assert!(playback_events(drain(&mut rx)).contains(&PlaybackEvent::QueueEnded { track_id: "x".into() }));
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn test_end_of_queue_pauses_at_start() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[1].clone(), Some(queue)).await.unwrap();
    f.time(199).await;
    let mut rx = f.bus.subscribe();
    f.output.clear();

    f.ended().await;

    let snapshot = f.session.snapshot();
    assert_eq!(f.current_id().as_deref(), Some("b"));
    assert_eq!(snapshot.phase, PlaybackPhase::Paused);
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.position, Duration::ZERO);
    assert_eq!(f.output.commands(), vec![Command::Pause, Command::Seek(Duration::ZERO)]);
    assert_eq!(
        playback_events(drain(&mut rx)),
        vec![
            PlaybackEvent::Completed { track_id: "b".into() },
            PlaybackEvent::QueueEnded { track_id: "b".into() },
        ]
    );
}

#[tokio::test]
async fn test_completion_advances_through_queue() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[0].clone(), Some(queue.clone())).await.unwrap();

    f.ended().await;

    assert_eq!(f.current_id().as_deref(), Some("b"));
    assert_eq!(f.output.last_load(), Some(remote(&queue[1])));
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Playing);
}

#[tokio::test]
async fn test_repeat_one_replays_without_reloading() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[0].clone(), Some(queue)).await.unwrap();
    f.session.toggle_repeat();
    assert_eq!(f.session.toggle_repeat(), RepeatMode::One);
    f.time(199).await;
    f.output.clear();

    f.ended().await;

    assert_eq!(f.output.commands(), vec![Command::Seek(Duration::ZERO), Command::Play]);
    let snapshot = f.session.snapshot();
    assert_eq!(f.current_id().as_deref(), Some("a"));
    assert_eq!(snapshot.position, Duration::ZERO);
    assert_eq!(snapshot.phase, PlaybackPhase::Playing);
}

#[tokio::test]
async fn test_repeat_all_wraps_to_first() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[1].clone(), Some(queue.clone())).await.unwrap();
    assert_eq!(f.session.toggle_repeat(), RepeatMode::All);

    f.ended().await;

    assert_eq!(f.current_id().as_deref(), Some("a"));
    assert_eq!(f.output.last_load(), Some(remote(&queue[0])));
}

#[tokio::test]
async fn test_completion_uses_settings_changed_during_playback() {
    let f = Fixture::new();
    f.session.play_track(track("a"), Some(tracks(&["a"]))).await.unwrap();

    // both changes land after the track started
    f.session.set_queue(tracks(&["a", "c"]));
    f.ended().await;
    assert_eq!(f.current_id().as_deref(), Some("c"));

    f.session.toggle_repeat();
    f.ended().await;
    assert_eq!(f.current_id().as_deref(), Some("a"));
}

#[tokio::test]
async fn test_seeded_shuffle_is_reproducible() {
    async fn walk() -> Vec<String> {
        let f = Fixture::new();
        let queue = tracks(&["t0", "t1", "t2", "t3", "t4"]);
        f.session.play_track(queue[0].clone(), Some(queue)).await.unwrap();
        assert!(f.session.toggle_shuffle());

        let mut visited = Vec::new();
        for _ in 0..8 {
            f.session.next().await.unwrap();
            visited.push(f.current_id().unwrap());
        }
        visited
    }

    let first = walk().await;
    assert_eq!(first, walk().await);
    assert!(first.iter().all(|id| id.starts_with('t')));
}

// ============================================================================
// Radio
// ============================================================================

#[tokio::test]
async fn test_radio_ignores_queue_navigation() {
    let f = Fixture::new();
    let mut station = RadioStation::new("r1", "Jazz FM", "https://radio.example.com/jazz");
    station.image = "https://img.example.com/jazz.png".into();
    f.session.set_queue(tracks(&["a", "b"]));

    f.session.play_radio(station.clone()).await.unwrap();
    assert_eq!(
        f.output.commands(),
        vec![
            Command::Load(AudioSource::remote("https://radio.example.com/jazz")),
            Command::Play
        ]
    );
    assert_eq!(f.session.snapshot().target, PlaybackTarget::Radio(station));
    assert_eq!(
        f.session.display_cover(),
        Some(CoverArt::Remote("https://img.example.com/jazz.png".into()))
    );

    f.output.clear();
    f.session.next().await.unwrap();
    f.session.prev().await.unwrap();
    assert!(f.output.commands().is_empty());

    f.ended().await;
    let snapshot = f.session.snapshot();
    assert_eq!(snapshot.phase, PlaybackPhase::Ended);
    assert!(!snapshot.is_playing);
    assert!(f.output.loads().is_empty());
}

#[tokio::test]
async fn test_output_error_does_not_skip() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b"]);
    f.session.play_track(queue[0].clone(), Some(queue)).await.unwrap();
    let mut rx = f.bus.subscribe();
    f.output.clear();

    f.session
        .handle_output_event(OutputEvent::Error {
            message: "decode error".into(),
        })
        .await
        .unwrap();

    assert_eq!(f.current_id().as_deref(), Some("a"));
    assert!(f.output.loads().is_empty());
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Paused);
    assert_eq!(
        playback_events(drain(&mut rx)),
        vec![PlaybackEvent::Error {
            id: Some("a".into()),
            message: "decode error".into()
        }]
    );
}

// ============================================================================
// Races
// ============================================================================

#[tokio::test]
async fn test_slow_local_resolution_is_discarded() {
    let f = Fixture::new();
    let (a, b) = (track("a"), track("b"));
    f.cache(&a).await;
    let gate = Gate::closed();
    f.store.gate_reads(Some(gate.clone()));

    let first = {
        let session = f.session.clone();
        let a = a.clone();
        tokio::spawn(async move { session.play_track(a, None).await })
    };
    let session = f.session.clone();
    wait_until(|| session.current_track().is_some()).await;

    f.session.play_track(b.clone(), None).await.unwrap();
    gate.open(1);
    first.await.unwrap().unwrap();

    assert_eq!(f.output.loads(), vec![remote(&b)]);
    assert_eq!(f.current_id().as_deref(), Some("b"));
    assert_eq!(f.output.live_buffers(), 0);
}

#[tokio::test]
async fn test_superseded_load_never_starts() {
    let f = Fixture::new();
    let (a, b) = (track("a"), track("b"));
    let gate = Gate::closed();
    f.output.gate_loads(Some(gate.clone()));

    let first = {
        let session = f.session.clone();
        let a = a.clone();
        tokio::spawn(async move { session.play_track(a, None).await })
    };
    let output = f.output.clone();
    wait_until(|| output.load_attempts() == 1).await;

    let second = {
        let session = f.session.clone();
        let b = b.clone();
        tokio::spawn(async move { session.play_track(b, None).await })
    };
    gate.open(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(
        f.output.commands(),
        vec![Command::Load(remote(&a)), Command::Load(remote(&b)), Command::Play]
    );
    assert_eq!(f.current_id().as_deref(), Some("b"));
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Playing);
}

#[tokio::test]
async fn test_end_of_previous_track_during_resolution_is_ignored() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b", "c"]);
    f.session.play_track(queue[0].clone(), Some(queue.clone())).await.unwrap();
    f.cache(&queue[1]).await;
    let gate = Gate::closed();
    f.store.gate_reads(Some(gate.clone()));

    let pending = {
        let session = f.session.clone();
        let b = queue[1].clone();
        tokio::spawn(async move { session.play_track(b, None).await })
    };
    let session = f.session.clone();
    wait_until(|| session.current_track().is_some_and(|t| t.id.as_str() == "b")).await;

    // "a" finishing must not advance the queue past "b"
    f.ended().await;
    gate.open(1);
    pending.await.unwrap().unwrap();

    assert_eq!(f.current_id().as_deref(), Some("b"));
    let loads = f.output.loads();
    assert_eq!(loads.len(), 2);
    assert!(matches!(loads[1], AudioSource::Buffer { .. }));
    assert!(!loads.contains(&remote(&queue[2])));
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Playing);
}

#[tokio::test]
async fn test_reports_from_superseded_source_are_ignored_while_loading() {
    let f = Fixture::new();
    let queue = tracks(&["a", "b", "c"]);
    f.session.play_track(queue[0].clone(), Some(queue.clone())).await.unwrap();
    f.time(50).await;
    let gate = Gate::closed();
    f.output.gate_loads(Some(gate.clone()));

    let pending = {
        let session = f.session.clone();
        let b = queue[1].clone();
        tokio::spawn(async move { session.play_track(b, None).await })
    };
    let output = f.output.clone();
    wait_until(|| output.load_attempts() == 2).await;

    f.time(120).await;
    f.session
        .handle_output_event(OutputEvent::DurationKnown {
            duration: Duration::from_secs(999),
        })
        .await
        .unwrap();
    f.session
        .handle_output_event(OutputEvent::Error {
            message: "decode error".into(),
        })
        .await
        .unwrap();
    f.ended().await;
    gate.open(1);
    pending.await.unwrap().unwrap();

    assert_eq!(f.output.loads(), vec![remote(&queue[0]), remote(&queue[1])]);
    let snapshot = f.session.snapshot();
    assert_eq!(f.current_id().as_deref(), Some("b"));
    assert_eq!(snapshot.position, Duration::ZERO);
    assert_eq!(snapshot.duration, Duration::from_secs(200));
    assert_eq!(snapshot.phase, PlaybackPhase::Playing);
    assert!(snapshot.is_playing);

    // reports for the attached source apply again
    f.time(3).await;
    assert_eq!(f.session.snapshot().position, Duration::from_secs(3));
}

// ============================================================================
// Offline swap
// ============================================================================

#[tokio::test]
async fn test_offline_copy_swaps_in_at_same_position() {
    let f = Fixture::new();
    let a = track("a");
    f.session.play_track(a.clone(), None).await.unwrap();
    f.time(42).await;
    let mut rx = f.bus.subscribe();
    f.output.clear();

    f.cache(&a).await;
    f.session.handle_cache_change(&CacheChange::Added(a.id.clone())).await.unwrap();

    let commands = f.output.commands();
    assert!(matches!(commands[0], Command::Load(AudioSource::Buffer { .. })));
    assert_eq!(
        &commands[1..],
        &[Command::Seek(Duration::from_secs(42)), Command::Play]
    );
    assert_eq!(f.session.snapshot().position, Duration::from_secs(42));
    assert!(playback_events(drain(&mut rx)).contains(&PlaybackEvent::SourceSwapped {
        track_id: "a".into(),
        position_ms: 42_000
    }));

    // a second notification is a no-op
    f.output.clear();
    f.session.handle_cache_change(&CacheChange::Added(a.id.clone())).await.unwrap();
    assert!(f.output.commands().is_empty());
}

#[tokio::test]
async fn test_offline_swap_keeps_paused_state() {
    let f = Fixture::new();
    let a = track("a");
    f.session.play_track(a.clone(), None).await.unwrap();
    f.time(5).await;
    f.session.toggle_play().await.unwrap();
    f.output.clear();

    f.cache(&a).await;
    f.session.handle_cache_change(&CacheChange::Added(a.id.clone())).await.unwrap();

    assert!(!f.output.commands().contains(&Command::Play));
    assert_eq!(f.session.snapshot().phase, PlaybackPhase::Paused);
}

#[tokio::test]
async fn test_cache_change_for_other_track_is_ignored() {
    let f = Fixture::new();
    let (a, b) = (track("a"), track("b"));
    f.session.play_track(a, None).await.unwrap();
    f.output.clear();

    f.cache(&b).await;
    f.session.handle_cache_change(&CacheChange::Added(b.id.clone())).await.unwrap();

    assert!(f.output.commands().is_empty());
    assert_eq!(f.output.live_buffers(), 0);
}

#[tokio::test]
async fn test_cache_watcher_applies_swaps() {
    let f = Fixture::new();
    let a = track("a");
    let watcher = PlaybackSession::spawn_cache_watcher(&f.session, &f.index);
    f.session.play_track(a.clone(), None).await.unwrap();

    f.store_offline(&a, None).await;
    f.index.add(a.id.clone());

    let output = f.output.clone();
    wait_until(|| matches!(output.last_load(), Some(AudioSource::Buffer { .. }))).await;
    watcher.abort();
}

#[tokio::test]
async fn test_resync_picks_up_copy_cached_without_notice() {
    let f = Fixture::new();
    let a = track("a");
    f.session.play_track(a.clone(), None).await.unwrap();
    f.time(12).await;
    f.cache(&a).await;
    f.output.clear();

    f.session.resync_with_cache().await.unwrap();

    let commands = f.output.commands();
    assert!(matches!(commands[0], Command::Load(AudioSource::Buffer { .. })));
    assert_eq!(commands[1], Command::Seek(Duration::from_secs(12)));

    // nothing new in the index
    f.output.clear();
    f.session.resync_with_cache().await.unwrap();
    assert!(f.output.commands().is_empty());
}

#[tokio::test]
async fn test_cache_watcher_recovers_after_missing_notifications() {
    let f = Fixture::new();
    let a = track("a");
    let watcher = PlaybackSession::spawn_cache_watcher(&f.session, &f.index);
    f.session.play_track(a.clone(), None).await.unwrap();

    // flood the change channel before the watcher gets to run
    f.store_offline(&a, None).await;
    f.index.add(a.id.clone());
    for i in 0..100 {
        f.index.add(format!("other-{}", i).into());
    }

    let output = f.output.clone();
    wait_until(|| matches!(output.last_load(), Some(AudioSource::Buffer { .. }))).await;
    assert_eq!(f.current_id().as_deref(), Some("a"));
    watcher.abort();
}

// ============================================================================
// Output failures
// ============================================================================

mock! {
    pub Output {}

    #[async_trait]
    impl AudioOutput for Output {
        async fn load(&self, source: &AudioSource) -> BridgeResult<()>;
        async fn play(&self) -> BridgeResult<()>;
        async fn pause(&self) -> BridgeResult<()>;
        async fn seek(&self, position: Duration) -> BridgeResult<()>;
        fn register_buffer(&self, data: Bytes) -> BridgeResult<BufferHandle>;
        fn release_buffer(&self, handle: BufferHandle);
    }
}

#[tokio::test]
async fn test_output_play_failure_surfaces() {
    let mut output = MockOutput::new();
    output.expect_load().times(1).returning(|_| Ok(()));
    output
        .expect_play()
        .returning(|| Err(BridgeError::OperationFailed("device lost".into())));
    output.expect_register_buffer().never();

    let output: Arc<dyn AudioOutput> = Arc::new(output);
    let tracks = Arc::new(BlobOfflineTrackRepository::new(GatedBlobStore::new()));
    let resolver = SourceResolver::new(Arc::new(CacheIndex::new()), tracks, output.clone());
    let session = PlaybackSession::new(SessionConfig::default(), output, resolver).unwrap();

    let result = session.play_track(track("a"), None).await;
    assert!(matches!(result, Err(PlaybackError::Output(_))));
}
