//! Phase handler registry
//!
//! Routes each cycle to the handler for the current phase. A paused recorder
//! always goes to the Paused handler, whatever the derived phase says.

use super::command::{RecordingAction, RecordingCommand};
use super::context::RecordingContext;
use super::handlers::{
    HandlerDeps, InGameHandler, MatchingHandler, PausedHandler, PhaseHandler, PostFinishHandler,
    ResultHandler, StandbyHandler,
};
use super::phase::SessionPhase;
use crate::capture::Frame;
use crate::recorder::RecordState;
use std::collections::HashMap;

pub struct PhaseHandlerRegistry {
    handlers: HashMap<SessionPhase, Box<dyn PhaseHandler>>,
    paused: Box<dyn PhaseHandler>,
}

impl PhaseHandlerRegistry {
    /// Registry with no phase handlers, only the pause override
    pub fn with_paused(paused: Box<dyn PhaseHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            paused,
        }
    }

    /// The standard handler set
    pub fn new(deps: HandlerDeps) -> Self {
        let mut registry = Self::with_paused(Box::new(PausedHandler::new(deps.clone())));
        registry.register(SessionPhase::Standby, Box::new(StandbyHandler::new(deps.clone())));
        registry.register(SessionPhase::Matching, Box::new(MatchingHandler::new(deps.clone())));
        registry.register(SessionPhase::InGame, Box::new(InGameHandler::new(deps.clone())));
        registry.register(SessionPhase::PostFinish, Box::new(PostFinishHandler::new(deps.clone())));
        registry.register(SessionPhase::Result, Box::new(ResultHandler::new(deps)));
        registry
    }

    /// Install `handler` for `phase`, replacing any previous one
    pub fn register(&mut self, phase: SessionPhase, handler: Box<dyn PhaseHandler>) {
        self.handlers.insert(phase, handler);
    }

    pub async fn dispatch(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        state: RecordState,
    ) -> RecordingCommand {
        if state == RecordState::Paused {
            return self.paused.handle(frame, context, state).await;
        }

        let phase = SessionPhase::classify(context, state);
        match self.handlers.get(&phase) {
            Some(handler) => {
                tracing::trace!("Dispatching {} to {}", phase, handler.name());
                handler.handle(frame, context, state).await
            }
            None => {
                tracing::warn!("No handler registered for phase {}", phase);
                RecordingCommand::new(RecordingAction::None, context.clone(), "no handler")
            }
        }
    }
}
