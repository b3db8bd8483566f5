//! # Playback Session
//!
//! Owns the single audio output and drives it from user intents and host
//! notifications.
//!
//! ## State
//!
//! All mutable state lives in one [`SessionState`] behind a synchronous
//! lock that is never held across an `.await`. Every handler, including the
//! completion handler, reads the queue and the repeat/shuffle flags at the
//! moment it runs.
//!
//! Output commands are serialized through a second, async lock that also
//! owns the loaded source. Each intent that changes the target bumps an
//! epoch; a resolution that finishes after a newer intent compares its
//! epoch under that lock and is dropped, releasing any buffer it acquired.
//! Output notifications are only applied while the source on the output
//! belongs to the current epoch; anything the output reports about a
//! superseded source is ignored.
//!
//! ## Transitions
//!
//! ```text
//! Idle ──play──> Loading ──loaded──> Ready ──> Playing ⇄ Paused
//!                   │                              │
//!                   └──load failed──> Paused       └──ended──> Ended ──> next / restart / Paused@0
//! ```

use bridge_traits::playback::{AudioOutput, OutputEvent};
use core_library::models::{RadioStation, Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, TargetKind};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheChange, CacheIndex};
use crate::config::SessionConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{NextStep, PlayQueue, PrevStep, RepeatMode};
use crate::source::{CoverArt, ResolvedSource, SourceLease, SourceOrigin, SourceResolver};

// ============================================================================
// Public state types
// ============================================================================

/// What the session is playing. Track and radio playback are exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum PlaybackTarget {
    #[default]
    Idle,
    Track(Track),
    Radio(RadioStation),
}

impl PlaybackTarget {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackTarget::Idle)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            PlaybackTarget::Idle => None,
            PlaybackTarget::Track(track) => Some(track.id.as_str()),
            PlaybackTarget::Radio(station) => Some(station.id.as_str()),
        }
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            PlaybackTarget::Track(track) => Some(track),
            _ => None,
        }
    }

    pub fn station(&self) -> Option<&RadioStation> {
        match self {
            PlaybackTarget::Radio(station) => Some(station),
            _ => None,
        }
    }
}

/// Transport phase of the current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    #[default]
    Idle,
    /// A source is being resolved for the target.
    Loading,
    /// Source loaded, output not started.
    Ready,
    Playing,
    Paused,
    /// The source played to its end and no follow-up has started yet.
    Ended,
}

/// Point-in-time view of the session for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub target: PlaybackTarget,
    pub phase: PlaybackPhase,
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Duration,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    pub queue_len: usize,
}

// ============================================================================
// Internal state
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    target: PlaybackTarget,
    phase: PlaybackPhase,
    /// Play intent. Survives loading so a pending source starts on arrival.
    playing: bool,
    position: Duration,
    duration: Duration,
    repeat: RepeatMode,
    shuffle: bool,
    queue: PlayQueue,
    epoch: u64,
    /// Epoch whose source is attached to the output.
    attached: Option<u64>,
}

impl SessionState {
    /// Whether output notifications describe the current target.
    fn output_is_current(&self) -> bool {
        !self.target.is_idle() && self.attached == Some(self.epoch)
    }
}

/// The source currently attached to the output.
struct LoadedSource {
    target_id: String,
    origin: SourceOrigin,
    epoch: u64,
    _lease: Option<SourceLease>,
}

// ============================================================================
// Session
// ============================================================================

pub struct PlaybackSession {
    output: Arc<dyn AudioOutput>,
    resolver: SourceResolver,
    config: SessionConfig,
    event_bus: Option<EventBus>,
    state: Mutex<SessionState>,
    loaded: tokio::sync::Mutex<Option<LoadedSource>>,
    rng: Mutex<StdRng>,
}

impl PlaybackSession {
    pub fn new(config: SessionConfig, output: Arc<dyn AudioOutput>, resolver: SourceResolver) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        Ok(Self {
            output,
            resolver,
            config,
            event_bus: None,
            state: Mutex::new(SessionState::default()),
            loaded: tokio::sync::Mutex::new(None),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Replace the shuffle random source.
    pub fn with_rng(self, rng: StdRng) -> Self {
        *self.rng.lock() = rng;
        self
    }

    /// React to offline copies appearing for the current track.
    ///
    /// The task ends when the session is dropped or the index goes away.
    pub fn spawn_cache_watcher(session: &Arc<Self>, index: &CacheIndex) -> JoinHandle<()> {
        let mut changes = index.subscribe();
        let weak: Weak<Self> = Arc::downgrade(session);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(session) = weak.upgrade() else { break };
                        if let Err(e) = session.handle_cache_change(&change).await {
                            warn!(error = %e, "Failed to apply cache change");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Cache watcher lagged, resyncing with the index");
                        let Some(session) = weak.upgrade() else { break };
                        if let Err(e) = session.resync_with_cache().await {
                            warn!(error = %e, "Failed to resync with cache index");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Cache watcher stopped");
        })
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Make `track` the target and start it, optionally replacing the queue.
    ///
    /// Replaying the track that is already loaded keeps its position.
    #[instrument(skip(self, track, queue), fields(track_id = %track.id))]
    pub async fn play_track(&self, track: Track, queue: Option<Vec<Track>>) -> Result<()> {
        let (epoch, same_track) = {
            let mut state = self.state.lock();
            if let Some(queue) = queue {
                state.queue.set_queue(queue);
            }

            let same_track = state.target.track().is_some_and(|t| t.id == track.id);
            state.target = PlaybackTarget::Track(track.clone());
            state.epoch += 1;
            state.playing = true;
            if !same_track {
                state.phase = PlaybackPhase::Loading;
                state.position = Duration::ZERO;
                state.duration = nominal_duration(&state.target);
            }
            (state.epoch, same_track)
        };

        info!(title = %track.title, "Playing track");
        self.emit(PlaybackEvent::TargetChanged {
            kind: TargetKind::Track,
            id: track.id.to_string(),
            title: track.title.clone(),
        });

        let resolved = self.resolver.resolve_track(&track).await;
        self.apply_source(epoch, track.id.as_str(), resolved, same_track).await
    }

    /// Switch to radio mode and start the station stream.
    #[instrument(skip(self, station), fields(station_id = %station.id))]
    pub async fn play_radio(&self, station: RadioStation) -> Result<()> {
        let epoch = {
            let mut state = self.state.lock();
            state.target = PlaybackTarget::Radio(station.clone());
            state.epoch += 1;
            state.playing = true;
            state.phase = PlaybackPhase::Loading;
            state.position = Duration::ZERO;
            state.duration = Duration::ZERO;
            state.epoch
        };

        info!(name = %station.name, "Playing radio");
        self.emit(PlaybackEvent::TargetChanged {
            kind: TargetKind::Radio,
            id: station.id.clone(),
            title: station.name.clone(),
        });

        let resolved = self.resolver.resolve_station(&station);
        self.apply_source(epoch, &station.id, resolved, false).await
    }

    /// Flip between playing and paused. Returns the new play intent.
    ///
    /// Does nothing while idle.
    pub async fn toggle_play(&self) -> Result<bool> {
        let _loaded = self.loaded.lock().await;

        let (id, playing, phase, position) = {
            let mut state = self.state.lock();
            let Some(id) = state.target.id().map(str::to_string) else {
                return Ok(false);
            };
            state.playing = !state.playing;
            (id, state.playing, state.phase, state.position)
        };

        // a pending load picks up the intent on arrival
        if phase == PlaybackPhase::Loading {
            return Ok(playing);
        }

        if playing {
            self.output.play().await?;
            self.set_phase(PlaybackPhase::Playing);
            self.emit(PlaybackEvent::Resumed {
                id,
                position_ms: as_millis(position),
            });
        } else {
            self.output.pause().await?;
            self.set_phase(PlaybackPhase::Paused);
            self.emit(PlaybackEvent::Paused {
                id,
                position_ms: as_millis(position),
            });
        }
        Ok(playing)
    }

    /// Advance to the next queued track. Ignored in radio mode.
    #[instrument(skip(self))]
    pub async fn next(&self) -> Result<()> {
        let (current, epoch, step) = {
            let state = self.state.lock();
            let Some(current) = state.target.track() else {
                return Ok(());
            };
            let mut rng = self.rng.lock();
            let step = state
                .queue
                .next(&current.id, state.shuffle, state.repeat, &mut *rng);
            (current.id.clone(), state.epoch, step)
        };

        match step {
            NextStep::Play(track) => self.advance_to(&current, epoch, track).await,
            NextStep::Stop => self.stop_at_start(current, epoch).await,
        }
    }

    /// Restart the current track or step back in the queue. Ignored in
    /// radio mode.
    #[instrument(skip(self))]
    pub async fn prev(&self) -> Result<()> {
        let (current, epoch, step) = {
            let state = self.state.lock();
            let Some(current) = state.target.track() else {
                return Ok(());
            };
            let step = state
                .queue
                .prev(&current.id, state.position, self.config.restart_threshold);
            (current.id.clone(), state.epoch, step)
        };

        match step {
            PrevStep::Restart => self.seek(Duration::ZERO).await.map(|_| ()),
            PrevStep::Play(track) => self.advance_to(&current, epoch, track).await,
            PrevStep::Stop => self.stop_at_start(current, epoch).await,
        }
    }

    /// Jump within the loaded source. Returns the applied position, clamped
    /// to the known duration.
    ///
    /// # Errors
    ///
    /// `NoTargetLoaded` while idle.
    pub async fn seek(&self, position: Duration) -> Result<Duration> {
        let _loaded = self.loaded.lock().await;

        let (id, position) = {
            let mut state = self.state.lock();
            let Some(id) = state.target.id().map(str::to_string) else {
                return Err(PlaybackError::NoTargetLoaded);
            };
            let position = if state.duration.is_zero() {
                position
            } else {
                position.min(state.duration)
            };
            state.position = position;
            (id, position)
        };

        self.output.seek(position).await?;
        self.emit(PlaybackEvent::Seeked {
            id,
            position_ms: as_millis(position),
        });
        Ok(position)
    }

    /// `None -> All -> One -> None`
    pub fn toggle_repeat(&self) -> RepeatMode {
        let mut state = self.state.lock();
        state.repeat = state.repeat.cycle();
        debug!(repeat = ?state.repeat, "Repeat mode changed");
        state.repeat
    }

    pub fn toggle_shuffle(&self) -> bool {
        let mut state = self.state.lock();
        state.shuffle = !state.shuffle;
        debug!(shuffle = state.shuffle, "Shuffle changed");
        state.shuffle
    }

    /// Replace the queue without touching the current target.
    pub fn set_queue(&self, tracks: Vec<Track>) {
        self.state.lock().queue.set_queue(tracks);
    }

    pub fn prepend_to_queue(&self, track: Track) {
        self.state.lock().queue.prepend(track);
    }

    // ========================================================================
    // Host notifications
    // ========================================================================

    /// Feed a notification from the audio output into the session.
    pub async fn handle_output_event(&self, event: OutputEvent) -> Result<()> {
        match event {
            OutputEvent::TimeUpdate { position } => {
                let mut state = self.state.lock();
                if state.output_is_current() {
                    state.position = position;
                }
                Ok(())
            }
            OutputEvent::DurationKnown { duration } => {
                let mut state = self.state.lock();
                if state.output_is_current() {
                    state.duration = duration;
                }
                Ok(())
            }
            OutputEvent::Ended => self.on_ended().await,
            OutputEvent::Error { message } => {
                let (id, epoch) = {
                    let state = self.state.lock();
                    if !state.output_is_current() {
                        debug!(%message, "Ignoring error from a superseded source");
                        return Ok(());
                    }
                    (state.target.id().map(str::to_string), state.epoch)
                };
                // no skip-on-error; the target stays put in both modes
                self.stall(epoch, id, message);
                Ok(())
            }
        }
    }

    /// Swap the current track to its offline copy once it lands in the index.
    pub async fn handle_cache_change(&self, change: &CacheChange) -> Result<()> {
        let CacheChange::Added(added) = change else {
            return Ok(());
        };

        let (track, epoch) = {
            let state = self.state.lock();
            match state.target.track() {
                Some(track) if &track.id == added => (track.clone(), state.epoch),
                _ => return Ok(()),
            }
        };

        let already_local = {
            let loaded = self.loaded.lock().await;
            loaded
                .as_ref()
                .is_some_and(|l| l.origin == SourceOrigin::Local && l.target_id == track.id.as_str())
        };
        if already_local {
            return Ok(());
        }

        let resolved = self.resolver.resolve_track(&track).await?;
        if !resolved.is_local() {
            return Ok(());
        }

        info!(track_id = %track.id, "Offline copy available, switching source");
        self.apply_source(epoch, track.id.as_str(), Ok(resolved), true).await
    }

    /// Re-check the index for the current track after missed notifications.
    pub async fn resync_with_cache(&self) -> Result<()> {
        let Some(track) = self.current_track() else {
            return Ok(());
        };
        if !self.resolver.is_cached(&track.id) {
            return Ok(());
        }
        self.handle_cache_change(&CacheChange::Added(track.id)).await
    }

    // ========================================================================
    // Read state
    // ========================================================================

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.state.lock();
        PlaybackSnapshot {
            target: state.target.clone(),
            phase: state.phase,
            is_playing: state.playing,
            position: state.position,
            duration: state.duration,
            repeat_mode: state.repeat,
            shuffle: state.shuffle,
            queue_len: state.queue.len(),
        }
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().target.track().cloned()
    }

    pub fn queue(&self) -> Vec<Track> {
        self.state.lock().queue.tracks().to_vec()
    }

    /// Cover to show for the current target.
    pub fn display_cover(&self) -> Option<CoverArt> {
        match &self.state.lock().target {
            PlaybackTarget::Idle => None,
            PlaybackTarget::Track(track) => Some(self.resolver.covers().display_cover(track)),
            PlaybackTarget::Radio(station) => Some(CoverArt::Remote(station.image.clone())),
        }
    }

    /// Cover to show for any track.
    pub fn cover_for(&self, track: &Track) -> CoverArt {
        self.resolver.covers().display_cover(track)
    }

    pub fn forget_cover(&self, track_id: &TrackId) {
        self.resolver.covers().forget(track_id);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Attach a resolved source for the intent identified by `epoch`.
    ///
    /// With `keep_position` the source replaces one for the same target and
    /// the current position and play intent carry over.
    async fn apply_source(
        &self,
        epoch: u64,
        target_id: &str,
        resolved: Result<ResolvedSource>,
        keep_position: bool,
    ) -> Result<()> {
        let mut loaded = self.loaded.lock().await;

        let stale = self.state.lock().epoch != epoch;
        if stale {
            debug!(target_id, "Discarding stale source resolution");
            return Ok(());
        }

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.stall(epoch, Some(target_id.to_string()), e.to_string());
                return Ok(());
            }
        };

        if let Some(current) = loaded.as_mut() {
            let same_target = current.target_id == target_id;
            // already served by a swap for this very intent
            if same_target && current.epoch == epoch && !keep_position {
                return Ok(());
            }
            if same_target && keep_position && current.origin == resolved.origin {
                current.epoch = epoch;
                self.attach(epoch);
                return self.start_if_wanted(epoch, target_id).await;
            }
        }

        let resume_at = {
            let mut state = self.state.lock();
            state.attached = None;
            if !keep_position && state.epoch == epoch {
                state.duration = nominal_duration(&state.target);
            }
            keep_position.then_some(state.position)
        };

        // release the previous source before attaching the next one
        *loaded = None;

        if let Err(e) = self.output.load(&resolved.source).await {
            self.stall(epoch, Some(target_id.to_string()), e.to_string());
            return Ok(());
        }

        let origin = resolved.origin.clone();
        *loaded = Some(LoadedSource {
            target_id: target_id.to_string(),
            origin: origin.clone(),
            epoch,
            _lease: resolved.into_lease(),
        });
        self.attach(epoch);

        if let Some(position) = resume_at.filter(|p| !p.is_zero()) {
            self.output.seek(position).await?;
        }

        {
            let mut state = self.state.lock();
            if state.epoch == epoch {
                state.phase = PlaybackPhase::Ready;
                if !keep_position {
                    state.position = Duration::ZERO;
                }
            }
        }

        if let (Some(position), SourceOrigin::Local) = (resume_at, &origin) {
            self.emit(PlaybackEvent::SourceSwapped {
                track_id: target_id.to_string(),
                position_ms: as_millis(position),
            });
        }

        self.start_if_wanted(epoch, target_id).await
    }

    /// Start the output if the intent still wants playback. The caller
    /// holds the output lock.
    async fn start_if_wanted(&self, epoch: u64, target_id: &str) -> Result<()> {
        let wants_play = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return Ok(());
            }
            if !state.playing {
                state.phase = PlaybackPhase::Paused;
            }
            state.playing
        };

        if wants_play {
            self.output.play().await?;
            self.set_phase(PlaybackPhase::Playing);
            self.emit(PlaybackEvent::Started {
                id: target_id.to_string(),
            });
        }
        Ok(())
    }

    async fn on_ended(&self) -> Result<()> {
        let (current, repeat, epoch) = {
            let mut state = self.state.lock();
            if !state.output_is_current() {
                debug!("Ignoring end of a superseded source");
                return Ok(());
            }
            let current = match &state.target {
                PlaybackTarget::Track(track) => track.clone(),
                PlaybackTarget::Radio(_) => {
                    // streams carry no queue; just stop
                    state.phase = PlaybackPhase::Ended;
                    state.playing = false;
                    return Ok(());
                }
                PlaybackTarget::Idle => return Ok(()),
            };
            state.phase = PlaybackPhase::Ended;
            (current, state.repeat, state.epoch)
        };

        self.emit(PlaybackEvent::Completed {
            track_id: current.id.to_string(),
        });

        if repeat == RepeatMode::One {
            return self.restart_current(epoch, &current.id).await;
        }

        let step = {
            let state = self.state.lock();
            let mut rng = self.rng.lock();
            state
                .queue
                .next(&current.id, state.shuffle, state.repeat, &mut *rng)
        };

        match step {
            NextStep::Play(track) => self.advance_to(&current.id, epoch, track).await,
            NextStep::Stop => self.stop_at_start(current.id, epoch).await,
        }
    }

    /// Queue navigation onto the current track replays it from zero.
    async fn advance_to(&self, current: &TrackId, epoch: u64, track: Track) -> Result<()> {
        if &track.id == current {
            self.restart_current(epoch, current).await
        } else {
            self.play_track(track, None).await
        }
    }

    async fn restart_current(&self, epoch: u64, track_id: &TrackId) -> Result<()> {
        let _loaded = self.loaded.lock().await;
        let stale = self.state.lock().epoch != epoch;
        if stale {
            return Ok(());
        }

        self.output.seek(Duration::ZERO).await?;
        self.output.play().await?;
        {
            let mut state = self.state.lock();
            state.position = Duration::ZERO;
            state.playing = true;
            state.phase = PlaybackPhase::Playing;
        }
        self.emit(PlaybackEvent::Started {
            id: track_id.to_string(),
        });
        Ok(())
    }

    /// Pause at zero with the track still loaded.
    async fn stop_at_start(&self, track_id: TrackId, epoch: u64) -> Result<()> {
        let _loaded = self.loaded.lock().await;
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return Ok(());
            }
            state.playing = false;
            state.phase = PlaybackPhase::Paused;
            state.position = Duration::ZERO;
        }

        self.output.pause().await?;
        self.output.seek(Duration::ZERO).await?;
        info!(track_id = %track_id, "Queue ended");
        self.emit(PlaybackEvent::QueueEnded {
            track_id: track_id.to_string(),
        });
        Ok(())
    }

    /// Park the session after a load or output failure.
    fn stall(&self, epoch: u64, id: Option<String>, message: String) {
        warn!(id = ?id, %message, "Playback stalled");
        {
            let mut state = self.state.lock();
            if state.epoch == epoch {
                state.playing = false;
                state.phase = PlaybackPhase::Paused;
            }
        }
        self.emit(PlaybackEvent::Error { id, message });
    }

    /// Mark the source for `epoch` as the one the output reports on.
    fn attach(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.attached = Some(epoch);
        }
    }

    fn set_phase(&self, phase: PlaybackPhase) {
        self.state.lock().phase = phase;
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

/// Duration advertised by the target's metadata. Streams have none.
fn nominal_duration(target: &PlaybackTarget) -> Duration {
    target
        .track()
        .map_or(Duration::ZERO, |track| Duration::from_secs(u64::from(track.duration)))
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
