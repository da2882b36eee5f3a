//! Recording commands
//!
//! A handler's decision for one cycle: what the recorder should do and what
//! the next context looks like. Execution happens in the orchestrator.

use super::context::RecordingContext;
use crate::recorder::StateEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingAction {
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
    ResetMetadata,
    None,
}

impl RecordingAction {
    /// State machine event raised when the action executes successfully
    pub fn state_event(&self) -> Option<StateEvent> {
        match self {
            RecordingAction::Start => Some(StateEvent::Start),
            RecordingAction::Pause => Some(StateEvent::Pause),
            RecordingAction::Resume => Some(StateEvent::Resume),
            RecordingAction::Stop => Some(StateEvent::Stop),
            RecordingAction::Cancel => Some(StateEvent::Cancel),
            RecordingAction::ResetMetadata | RecordingAction::None => None,
        }
    }

    /// Parse a command bus name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(RecordingAction::Start),
            "pause" => Some(RecordingAction::Pause),
            "resume" => Some(RecordingAction::Resume),
            "stop" => Some(RecordingAction::Stop),
            "cancel" => Some(RecordingAction::Cancel),
            "reset" => Some(RecordingAction::ResetMetadata),
            _ => None,
        }
    }
}

impl fmt::Display for RecordingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingAction::Start => "start",
            RecordingAction::Pause => "pause",
            RecordingAction::Resume => "resume",
            RecordingAction::Stop => "stop",
            RecordingAction::Cancel => "cancel",
            RecordingAction::ResetMetadata => "reset_metadata",
            RecordingAction::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RecordingCommand {
    pub action: RecordingAction,
    /// Context to install once the action has been executed
    pub context: RecordingContext,
    pub reason: String,
}

impl RecordingCommand {
    pub fn new(action: RecordingAction, context: RecordingContext, reason: impl Into<String>) -> Self {
        Self {
            action,
            context,
            reason: reason.into(),
        }
    }

    /// No recorder action, context possibly updated
    pub fn none(context: RecordingContext) -> Self {
        Self::new(RecordingAction::None, context, "")
    }

    pub fn start(context: RecordingContext, reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::Start, context, reason)
    }

    pub fn pause(context: RecordingContext, reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::Pause, context, reason)
    }

    pub fn resume(context: RecordingContext, reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::Resume, context, reason)
    }

    pub fn stop(context: RecordingContext, reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::Stop, context, reason)
    }

    pub fn cancel(context: RecordingContext, reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::Cancel, context, reason)
    }

    pub fn reset_metadata(reason: impl Into<String>) -> Self {
        Self::new(RecordingAction::ResetMetadata, RecordingContext::new(), reason)
    }
}
