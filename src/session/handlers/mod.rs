//! Phase handlers
//!
//! One handler per session phase, plus the Paused override. A handler looks
//! at the frame and the current snapshot and returns a single
//! [`RecordingCommand`]; it never touches the recorder. Events published here
//! are announcements only.

pub mod in_game;
pub mod matching;
pub mod paused;
pub mod post_finish;
pub mod result;
pub mod standby;

pub use in_game::InGameHandler;
pub use matching::MatchingHandler;
pub use paused::PausedHandler;
pub use post_finish::PostFinishHandler;
pub use result::ResultHandler;
pub use standby::StandbyHandler;

use super::command::RecordingCommand;
use super::context::RecordingContext;
use crate::analyzer::{AnalyzerResult, FrameAnalyzer, WeaponRecognizer};
use crate::capture::Frame;
use crate::config::Settings;
use crate::recorder::RecordState;
use crate::runtime::EventPublisher;
use async_trait::async_trait;
use std::sync::Arc;

/// Capabilities shared by every handler
#[derive(Clone)]
pub struct HandlerDeps {
    pub analyzer: Arc<dyn FrameAnalyzer>,
    pub weapons: Option<Arc<dyn WeaponRecognizer>>,
    pub events: EventPublisher,
    pub weapon_max_attempts: u32,
    pub weapon_score_threshold: f64,
}

impl HandlerDeps {
    pub fn new(
        analyzer: Arc<dyn FrameAnalyzer>,
        weapons: Option<Arc<dyn WeaponRecognizer>>,
        events: EventPublisher,
        settings: &Settings,
    ) -> Self {
        Self {
            analyzer,
            weapons,
            events,
            weapon_max_attempts: settings.weapon_max_attempts,
            weapon_score_threshold: settings.weapon_score_threshold,
        }
    }
}

#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        frame: &Frame,
        context: &RecordingContext,
        state: RecordState,
    ) -> RecordingCommand;
}

/// Analyzer failures count as "not detected" for this cycle
pub(crate) fn detected(label: &str, result: AnalyzerResult<bool>) -> bool {
    match result {
        Ok(hit) => {
            if hit {
                tracing::debug!("Detected {}", label);
            }
            hit
        }
        Err(e) => {
            tracing::warn!("{} detection failed: {}", label, e);
            false
        }
    }
}

/// Analyzer failures count as "nothing extracted"
pub(crate) fn extracted<T>(label: &str, result: AnalyzerResult<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("{} extraction failed: {}", label, e);
        None
    })
}
