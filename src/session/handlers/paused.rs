//! Paused: evaluated whenever the recorder is paused, whatever the phase

use super::{detected, HandlerDeps, PhaseHandler};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::session::command::RecordingCommand;
use crate::session::context::{RecordingContext, ResumeTrigger};
use async_trait::async_trait;

pub struct PausedHandler {
    deps: HandlerDeps,
}

impl PausedHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }

    async fn triggered(&self, trigger: ResumeTrigger, frame: &Frame) -> bool {
        let analyzer = &self.deps.analyzer;
        match trigger {
            ResumeTrigger::JudgementDetected => {
                detected("judgement", analyzer.detect_session_judgement(frame).await)
            }
            ResumeTrigger::LoadingEnded => {
                detected("loading end", analyzer.detect_loading_end(frame).await)
            }
        }
    }
}

#[async_trait]
impl PhaseHandler for PausedHandler {
    fn name(&self) -> &'static str {
        "paused"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        _state: RecordState,
    ) -> RecordingCommand {
        // Without a trigger only a manual resume gets us out
        let Some(trigger) = context.resume_trigger else {
            return RecordingCommand::none(context.clone());
        };

        if self.triggered(trigger, frame).await {
            tracing::info!("Resume trigger {:?} fired", trigger);
            return RecordingCommand::resume(
                context.with_resume_trigger(None),
                format!("{:?}", trigger),
            );
        }

        RecordingCommand::none(context.clone())
    }
}
