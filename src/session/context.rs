//! Recording context
//!
//! Immutable snapshot of everything the orchestrator has learned about the
//! current session. Handlers never mutate it; they build the next snapshot
//! through the `with_*` methods and hand it back inside a command.

use crate::analyzer::{GameMode, Judgement, Rate, SessionResult, WeaponSlots};
use crate::capture::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session facts accumulated from matching through the result screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub game_mode: Option<GameMode>,
    pub rate: Option<Rate>,
    /// When matchmaking started
    pub started_at: Option<DateTime<Utc>>,
    pub judgement: Option<Judgement>,
    pub result: Option<SessionResult>,
}

/// Condition the Paused handler evaluates to decide when to resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTrigger {
    /// The win/lose screen appeared after the finish whistle
    JudgementDetected,
    /// A loading screen went away
    LoadingEnded,
}

/// Bounded-retry state of the weapon recognition sub-task
#[derive(Debug, Clone, Default)]
pub struct WeaponDetectionState {
    pub attempts: u32,
    pub best: WeaponSlots,
    /// Last frame on which the weapon display was visible
    pub last_visible_frame: Option<Frame>,
    /// Set once every slot is confident or attempts ran out
    pub done: bool,
}

impl WeaponDetectionState {
    /// Slots whose best score is still below `threshold`
    pub fn pending_slots(&self, threshold: f64) -> Vec<usize> {
        self.best
            .iter()
            .enumerate()
            .filter(|(_, guess)| guess.as_ref().map_or(true, |g| g.score < threshold))
            .map(|(slot, _)| slot)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingContext {
    pub metadata: SessionMetadata,
    pub battle_started_at: Option<DateTime<Utc>>,
    pub finish: bool,
    pub result_frame: Option<Frame>,
    pub resume_trigger: Option<ResumeTrigger>,
    pub completed: bool,
    pub weapons: WeaponDetectionState,
}

impl RecordingContext {
    /// Fresh context for a new session
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(&self, metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    pub fn with_battle_started_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            battle_started_at: Some(at),
            ..self.clone()
        }
    }

    pub fn with_finish(&self, finish: bool) -> Self {
        Self {
            finish,
            ..self.clone()
        }
    }

    pub fn with_result_frame(&self, frame: Frame) -> Self {
        Self {
            result_frame: Some(frame),
            ..self.clone()
        }
    }

    pub fn with_resume_trigger(&self, trigger: Option<ResumeTrigger>) -> Self {
        Self {
            resume_trigger: trigger,
            ..self.clone()
        }
    }

    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    pub fn with_weapons(&self, weapons: WeaponDetectionState) -> Self {
        Self {
            weapons,
            ..self.clone()
        }
    }

    /// Seconds since the battle started, measured at `now`
    pub fn battle_elapsed_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        self.battle_started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0)
    }
}
