//! Weapon recognition capability
//!
//! Optional collaborator that reads the eight loadouts shown at the start of a
//! battle. Recognition is retried over several frames; each slot keeps its
//! best-scoring guess.

use super::AnalyzerResult;
use crate::capture::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of player slots on the weapon display (4 vs 4)
pub const WEAPON_SLOTS: usize = 8;

/// A candidate weapon for one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponGuess {
    pub name: String,
    pub score: f64,
}

/// Best guess per slot, `None` for slots not recognized yet
pub type WeaponSlots = [Option<WeaponGuess>; WEAPON_SLOTS];

#[async_trait]
pub trait WeaponRecognizer: Send + Sync {
    /// Whether the weapon display is currently on screen
    async fn detect_weapon_display(&self, frame: &Frame) -> AnalyzerResult<bool>;

    /// Recognize the weapons in `target_slots`.
    ///
    /// Returns one entry per requested slot, in the same order. `previous`
    /// holds the best guesses so far. Implementations should check the
    /// cancellation flag set by [`WeaponRecognizer::request_cancel`] and return
    /// [`super::AnalyzerError::Cancelled`] promptly.
    async fn recognize_weapons(
        &self,
        frame: &Frame,
        target_slots: &[usize],
        previous: &WeaponSlots,
    ) -> AnalyzerResult<Vec<Option<WeaponGuess>>>;

    /// Ask an in-flight recognition to stop
    fn request_cancel(&self);
}

/// Merge freshly recognized guesses into `best`, keeping the higher score
pub fn merge_guesses(
    best: &WeaponSlots,
    target_slots: &[usize],
    recognized: Vec<Option<WeaponGuess>>,
) -> WeaponSlots {
    let mut merged = best.clone();
    for (slot, guess) in target_slots.iter().zip(recognized) {
        let Some(guess) = guess else { continue };
        let Some(current) = merged.get_mut(*slot) else {
            continue;
        };
        let better = current.as_ref().map_or(true, |c| guess.score > c.score);
        if better {
            *current = Some(guess);
        }
    }
    merged
}
