//! Result: the result screen is up; stop once it goes away
//!
//! Result fields are extracted after the stop, not here, so the stop
//! decision is never held up by OCR.

use super::{detected, HandlerDeps, PhaseHandler};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::session::command::RecordingCommand;
use crate::session::context::RecordingContext;
use async_trait::async_trait;

pub struct ResultHandler {
    deps: HandlerDeps,
}

impl ResultHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PhaseHandler for ResultHandler {
    fn name(&self) -> &'static str {
        "result"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        state: RecordState,
    ) -> RecordingCommand {
        if state == RecordState::Stopped {
            return RecordingCommand::none(context.clone());
        }

        if detected(
            "result screen",
            self.deps.analyzer.detect_session_result(frame).await,
        ) {
            return RecordingCommand::none(context.clone());
        }

        RecordingCommand::stop(context.with_completed(true), "result screen closed")
    }
}
