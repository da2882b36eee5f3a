//! Values extracted from frames

use serde::{Deserialize, Serialize};
use std::fmt;

/// Match type selected on the lobby screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Regular,
    AnarchySeries,
    AnarchyOpen,
    XMatch,
    Challenge,
    Splatfest,
    Private,
}

impl GameMode {
    /// Whether the mode carries a rate worth extracting
    pub fn is_rated(&self) -> bool {
        matches!(
            self,
            GameMode::AnarchySeries | GameMode::AnarchyOpen | GameMode::XMatch
        )
    }
}

/// Player's standing in a rated mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Rate {
    /// Rank label, e.g. "S+12"
    Rank(String),
    /// Numeric power, e.g. 2350.4
    Power(f64),
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Rank(label) => write!(f, "{}", label),
            Rate::Power(power) => write!(f, "{:.1}", power),
        }
    }
}

/// Outcome shown right after the finish whistle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Win,
    Lose,
}

/// Fields read from the result screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub kill: Option<u32>,
    pub death: Option<u32>,
    pub special: Option<u32>,
    pub assist: Option<u32>,
    pub stage: Option<String>,
    pub rule: Option<String>,
}
