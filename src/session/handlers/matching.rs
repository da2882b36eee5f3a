//! Matching: matchmaking in progress, waiting for the battle to begin

use super::{detected, HandlerDeps, PhaseHandler};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::runtime::events;
use crate::session::command::RecordingCommand;
use crate::session::context::{RecordingContext, WeaponDetectionState};
use async_trait::async_trait;
use serde_json::json;

pub struct MatchingHandler {
    deps: HandlerDeps,
}

impl MatchingHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PhaseHandler for MatchingHandler {
    fn name(&self) -> &'static str {
        "matching"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        _state: RecordState,
    ) -> RecordingCommand {
        let analyzer = &self.deps.analyzer;

        if detected("schedule change", analyzer.detect_schedule_change(frame).await) {
            tracing::info!("Schedule changed while matching, discarding metadata");
            return RecordingCommand::reset_metadata("schedule changed");
        }

        if detected("session start", analyzer.detect_session_start(frame).await) {
            let started = frame.timestamp();
            tracing::info!("Battle started");
            self.deps.events.emit_value(
                events::BATTLE_STARTED,
                json!({
                    "startedAt": started,
                    "gameMode": context.metadata.game_mode,
                    "rate": context.metadata.rate,
                }),
            );

            let next = context
                .with_battle_started_at(started)
                .with_weapons(WeaponDetectionState::default());
            return RecordingCommand::start(next, "battle started");
        }

        RecordingCommand::none(context.clone())
    }
}
