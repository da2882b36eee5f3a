//! Frame analyzer capability
//!
//! The computer-vision side lives outside this crate. Phase handlers only see
//! it through [`FrameAnalyzer`] and the optional [`WeaponRecognizer`].

pub mod types;
pub mod weapon;

pub use types::{GameMode, Judgement, Rate, SessionResult};
pub use weapon::{merge_guesses, WeaponGuess, WeaponRecognizer, WeaponSlots, WEAPON_SLOTS};

use crate::capture::Frame;
use async_trait::async_trait;
use thiserror::Error;

/// Failures of an analyzer call. Never used to signal "nothing detected".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("Frame rejected: {0}")]
    InvalidFrame(String),

    #[error("Analyzer backend failed: {0}")]
    Backend(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Detections and extractions over a single frame.
///
/// Every method must be cheap enough (or internally rate limited) to be
/// called once per orchestrator cycle.
#[async_trait]
pub trait FrameAnalyzer: Send + Sync {
    async fn detect_match_select(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn extract_game_mode(&self, frame: &Frame) -> AnalyzerResult<Option<GameMode>>;

    async fn extract_rate(&self, frame: &Frame, mode: GameMode) -> AnalyzerResult<Option<Rate>>;

    async fn detect_matching_start(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_schedule_change(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_session_start(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_session_abort(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_session_finish(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_session_judgement(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn extract_session_judgement(&self, frame: &Frame) -> AnalyzerResult<Option<Judgement>>;

    async fn detect_session_result(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn extract_session_result(
        &self,
        frame: &Frame,
        mode: Option<GameMode>,
    ) -> AnalyzerResult<Option<SessionResult>>;

    async fn detect_loading(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_loading_end(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_power_off(&self, frame: &Frame) -> AnalyzerResult<bool>;

    async fn detect_communication_error(&self, frame: &Frame) -> AnalyzerResult<bool>;
}
