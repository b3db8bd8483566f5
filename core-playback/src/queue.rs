//! # Play Queue
//!
//! Ordered tracks of the current playback context with the repeat and
//! shuffle policies layered on top. The queue never touches the audio
//! output; it only answers "what comes next".

use core_library::models::{Track, TrackId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repeat policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    /// `None -> All -> One -> None`
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }
}

/// Result of advancing forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Play(Track),
    /// End of the queue, or the current track is not navigable.
    Stop,
}

/// Result of stepping back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrevStep {
    /// Seek the current track to zero without changing it.
    Restart,
    Play(Track),
    /// The current track is not navigable.
    Stop,
}

/// The active queue. Duplicate ids are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayQueue {
    tracks: Vec<Track>,
}

impl PlayQueue {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Replace the whole queue.
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    pub fn prepend(&mut self, track: Track) {
        self.tracks.insert(0, track);
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// First position of `id` in the queue.
    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    /// Pick the track after `current`.
    ///
    /// Shuffle draws uniformly from the whole queue, the current track
    /// included. Repeat-one is not handled here.
    pub fn next<R>(&self, current: &TrackId, shuffle: bool, repeat: RepeatMode, rng: &mut R) -> NextStep
    where
        R: Rng + ?Sized,
    {
        if self.tracks.is_empty() {
            return NextStep::Stop;
        }

        if shuffle {
            let index = rng.gen_range(0..self.tracks.len());
            return NextStep::Play(self.tracks[index].clone());
        }

        let Some(index) = self.index_of(current) else {
            return NextStep::Stop;
        };

        if index + 1 < self.tracks.len() {
            NextStep::Play(self.tracks[index + 1].clone())
        } else if repeat == RepeatMode::All {
            NextStep::Play(self.tracks[0].clone())
        } else {
            NextStep::Stop
        }
    }

    /// Pick the track before `current`.
    ///
    /// Past `restart_threshold` of playback the current track restarts.
    /// Otherwise the queue is walked backwards and always wraps from the
    /// first entry to the last, regardless of the repeat mode.
    pub fn prev(&self, current: &TrackId, elapsed: Duration, restart_threshold: Duration) -> PrevStep {
        if elapsed > restart_threshold {
            return PrevStep::Restart;
        }

        let Some(index) = self.index_of(current) else {
            return PrevStep::Stop;
        };

        let target = if index > 0 { index - 1 } else { self.tracks.len() - 1 };
        PrevStep::Play(self.tracks[target].clone())
    }
}
