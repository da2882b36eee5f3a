//! Standby: waiting in the lobby

use super::{detected, extracted, HandlerDeps, PhaseHandler};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::runtime::events;
use crate::session::command::RecordingCommand;
use crate::session::context::RecordingContext;
use async_trait::async_trait;
use serde_json::json;

pub struct StandbyHandler {
    deps: HandlerDeps,
}

impl StandbyHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PhaseHandler for StandbyHandler {
    fn name(&self) -> &'static str {
        "standby"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        _state: RecordState,
    ) -> RecordingCommand {
        let analyzer = &self.deps.analyzer;

        if detected("match select", analyzer.detect_match_select(frame).await) {
            let Some(mode) = extracted("game mode", analyzer.extract_game_mode(frame).await) else {
                return RecordingCommand::none(context.clone());
            };
            let rate = if mode.is_rated() {
                extracted("rate", analyzer.extract_rate(frame, mode).await)
            } else {
                None
            };

            let mut metadata = context.metadata.clone();
            if metadata.game_mode == Some(mode) && metadata.rate == rate {
                return RecordingCommand::none(context.clone());
            }
            metadata.game_mode = Some(mode);
            metadata.rate = rate;
            tracing::info!("Selected {:?} (rate {:?})", mode, metadata.rate);

            self.deps.events.emit_value(
                events::METADATA_UPDATED,
                json!({ "metadata": &metadata }),
            );
            return RecordingCommand::none(context.with_metadata(metadata));
        }

        if detected("matching start", analyzer.detect_matching_start(frame).await) {
            let mut metadata = context.metadata.clone();
            metadata.started_at = Some(frame.timestamp());
            tracing::info!("Matching started");

            self.deps.events.emit_value(
                events::MATCHING_STARTED,
                json!({ "startedAt": frame.timestamp(), "gameMode": metadata.game_mode }),
            );
            return RecordingCommand::none(context.with_metadata(metadata));
        }

        RecordingCommand::none(context.clone())
    }
}
