//! Session phase classification

use super::context::RecordingContext;
use crate::recorder::RecordState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finer-grained view of what the session is doing, used for dispatch only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Standby,
    Matching,
    InGame,
    PostFinish,
    Result,
    Completed,
}

impl SessionPhase {
    /// Derive the phase: result > finish > recording > matchmaking > standby.
    ///
    /// `Completed` is a dispatch key only and is never derived.
    pub fn classify(context: &RecordingContext, state: RecordState) -> Self {
        if context.result_frame.is_some() {
            SessionPhase::Result
        } else if context.finish {
            SessionPhase::PostFinish
        } else if state == RecordState::Recording {
            SessionPhase::InGame
        } else if context.metadata.started_at.is_some() {
            SessionPhase::Matching
        } else {
            SessionPhase::Standby
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Standby => "standby",
            SessionPhase::Matching => "matching",
            SessionPhase::InGame => "in_game",
            SessionPhase::PostFinish => "post_finish",
            SessionPhase::Result => "result",
            SessionPhase::Completed => "completed",
        };
        f.write_str(name)
    }
}
