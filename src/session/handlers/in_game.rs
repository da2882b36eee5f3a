//! InGame: the battle is being recorded
//!
//! Checks run in a fixed order and the first hit decides the cycle:
//! early abort, time ceiling, weapon recognition, finish, communication error.

use super::{detected, HandlerDeps, PhaseHandler};
use crate::analyzer::{merge_guesses, AnalyzerError, WeaponRecognizer};
use crate::capture::Frame;
use crate::recorder::RecordState;
use crate::runtime::events;
use crate::session::command::RecordingCommand;
use crate::session::context::{RecordingContext, ResumeTrigger};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// How long after the start an abort can still be detected
pub const ABORT_DETECTION_WINDOW_SECS: f64 = 60.0;

/// Delay before the abort notice shows up on screen
pub const ABORT_DISPLAY_DELAY_SECS: f64 = 30.0;

pub const EARLY_ABORT_WINDOW_SECS: f64 = ABORT_DETECTION_WINDOW_SECS + ABORT_DISPLAY_DELAY_SECS;

/// Hard limit on a single battle recording
pub const BATTLE_CEILING_SECS: f64 = 600.0;

/// Weapons are only shown during the opening seconds
pub const WEAPON_DETECTION_WINDOW_SECS: f64 = 20.0;

pub struct InGameHandler {
    deps: HandlerDeps,
}

impl InGameHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }

    /// One bounded recognition attempt, `None` if the sub-task does not apply
    async fn try_weapon_recognition(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        elapsed: f64,
    ) -> Option<RecordingCommand> {
        let recognizer: &Arc<dyn WeaponRecognizer> = self.deps.weapons.as_ref()?;
        if context.weapons.done || elapsed > WEAPON_DETECTION_WINDOW_SECS {
            return None;
        }
        if !detected("weapon display", recognizer.detect_weapon_display(frame).await) {
            return None;
        }

        let threshold = self.deps.weapon_score_threshold;
        let mut weapons = context.weapons.clone();
        weapons.attempts += 1;
        weapons.last_visible_frame = Some(frame.clone());

        let targets = weapons.pending_slots(threshold);
        match recognizer
            .recognize_weapons(frame, &targets, &weapons.best)
            .await
        {
            Ok(recognized) => {
                weapons.best = merge_guesses(&weapons.best, &targets, recognized);
            }
            Err(AnalyzerError::Cancelled) => {
                tracing::info!("Weapon recognition cancelled");
                weapons.done = true;
            }
            Err(e) => {
                tracing::warn!("Weapon recognition attempt {} failed: {}", weapons.attempts, e);
            }
        }

        let complete = weapons.pending_slots(threshold).is_empty();
        if !weapons.done && (complete || weapons.attempts >= self.deps.weapon_max_attempts) {
            weapons.done = true;
            tracing::info!(
                "Weapon recognition finished after {} attempts (complete: {})",
                weapons.attempts,
                complete
            );
            self.deps.events.emit_value(
                events::WEAPONS_DETECTED,
                json!({ "weapons": &weapons.best, "complete": complete }),
            );
        }

        Some(RecordingCommand::none(context.with_weapons(weapons)))
    }
}

#[async_trait]
impl PhaseHandler for InGameHandler {
    fn name(&self) -> &'static str {
        "in_game"
    }

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        _state: RecordState,
    ) -> RecordingCommand {
        let analyzer = &self.deps.analyzer;
        let elapsed = context.battle_elapsed_secs(frame.timestamp());

        if let Some(elapsed) = elapsed {
            if elapsed <= EARLY_ABORT_WINDOW_SECS
                && detected("session abort", analyzer.detect_session_abort(frame).await)
            {
                tracing::info!("Battle aborted {:.1}s after start", elapsed);
                return RecordingCommand::cancel(context.clone(), "early abort window");
            }

            if elapsed >= BATTLE_CEILING_SECS {
                tracing::warn!("Battle exceeded {}s, stopping", BATTLE_CEILING_SECS);
                return RecordingCommand::stop(context.clone(), "10 minute ceiling");
            }

            if let Some(command) = self.try_weapon_recognition(frame, context, elapsed).await {
                return command;
            }
        }

        if detected("session finish", analyzer.detect_session_finish(frame).await) {
            self.deps.events.emit_value(
                events::SESSION_FINISHED,
                json!({ "elapsedSecs": elapsed }),
            );
            let next = context
                .with_finish(true)
                .with_resume_trigger(Some(ResumeTrigger::JudgementDetected));
            return RecordingCommand::pause(next, "session finished");
        }

        if detected(
            "communication error",
            analyzer.detect_communication_error(frame).await,
        ) {
            return RecordingCommand::cancel(context.clone(), "communication error");
        }

        RecordingCommand::none(context.clone())
    }
}
