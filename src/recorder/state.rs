//! Recording state management
//!
//! Defines the recorder state machine and segment tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse state of the recording device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Last recording was stopped or cancelled
    Stopped,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordState::Idle => "idle",
            RecordState::Recording => "recording",
            RecordState::Paused => "paused",
            RecordState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Successfully executed recorder operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
}

/// Deterministic automaton over [`RecordState`].
///
/// Illegal transitions are logged and ignored so out-of-order detections
/// never take the orchestrator down.
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: RecordState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Target state for `event` from `from`, `None` if illegal
    pub fn transition(from: RecordState, event: StateEvent) -> Option<RecordState> {
        use RecordState::*;
        match (from, event) {
            (Idle | Stopped, StateEvent::Start) => Some(Recording),
            (Recording, StateEvent::Pause) => Some(Paused),
            (Paused, StateEvent::Resume) => Some(Recording),
            (Recording | Paused, StateEvent::Stop | StateEvent::Cancel) => Some(Stopped),
            _ => None,
        }
    }

    /// Apply `event` and return the resulting state
    pub fn handle(&mut self, event: StateEvent) -> RecordState {
        match Self::transition(self.state, event) {
            Some(next) => {
                tracing::debug!("State {} -> {} on {:?}", self.state, next, event);
                self.state = next;
            }
            None => {
                tracing::warn!("Ignoring {:?} while {}", event, self.state);
            }
        }
        self.state
    }
}

/// One contiguous recorded stretch.
///
/// A new segment is opened on start and on every resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    pub started_at: DateTime<Utc>,

    /// `None` while the segment is still being recorded
    pub ended_at: Option<DateTime<Utc>>,
}

impl RecordingSegment {
    pub fn duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_milliseconds().max(0)
    }
}

/// Segment history of the current recording
#[derive(Debug, Clone, Default)]
pub struct RecordingTimeline {
    segments: Vec<RecordingSegment>,
}

impl RecordingTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget previous segments and open the first one
    pub fn begin(&mut self, at: DateTime<Utc>) {
        self.segments.clear();
        self.open(at);
    }

    /// Open a new segment (resume)
    pub fn open(&mut self, at: DateTime<Utc>) {
        self.close(at);
        let index = self.segments.len();
        self.segments.push(RecordingSegment {
            index,
            started_at: at,
            ended_at: None,
        });
    }

    /// Close the running segment (pause/stop)
    pub fn close(&mut self, at: DateTime<Utc>) {
        if let Some(segment) = self.segments.last_mut() {
            if segment.ended_at.is_none() {
                segment.ended_at = Some(at);
            }
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[RecordingSegment] {
        &self.segments
    }

    /// Total recorded time, counting a running segment up to `now`
    pub fn duration_ms(&self, now: DateTime<Utc>) -> i64 {
        self.segments.iter().map(|s| s.duration_ms(now)).sum()
    }
}
