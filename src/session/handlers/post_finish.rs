//! PostFinish: between the finish whistle and the result screen

use super::{detected, extracted, HandlerDeps, PhaseHandler};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::runtime::events;
use crate::session::command::RecordingCommand;
use crate::session::context::{RecordingContext, ResumeTrigger};
use async_trait::async_trait;
use serde_json::json;

pub struct PostFinishHandler {
    deps: HandlerDeps,
}

impl PostFinishHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PhaseHandler for PostFinishHandler {
    fn name(&self) -> &'static str {
        "post_finish"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        _state: RecordState,
    ) -> RecordingCommand {
        let analyzer = &self.deps.analyzer;

        if context.metadata.judgement.is_none()
            && detected("judgement", analyzer.detect_session_judgement(frame).await)
        {
            if let Some(judgement) =
                extracted("judgement", analyzer.extract_session_judgement(frame).await)
            {
                let mut metadata = context.metadata.clone();
                metadata.judgement = Some(judgement);
                tracing::info!("Judgement: {:?}", judgement);

                self.deps
                    .events
                    .emit_value(events::SESSION_JUDGEMENT, json!({ "judgement": judgement }));
                self.deps
                    .events
                    .emit_value(events::METADATA_UPDATED, json!({ "metadata": &metadata }));
                return RecordingCommand::none(context.with_metadata(metadata));
            }
        }

        if detected("loading", analyzer.detect_loading(frame).await) {
            let next = context.with_resume_trigger(Some(ResumeTrigger::LoadingEnded));
            return RecordingCommand::pause(next, "loading screen");
        }

        if detected("result screen", analyzer.detect_session_result(frame).await) {
            tracing::info!("Result screen reached");
            return RecordingCommand::none(context.with_result_frame(frame.clone()));
        }

        RecordingCommand::none(context.clone())
    }
}
