//! Domain events broadcast to observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const MATCHING_STARTED: &str = "matching_started";
pub const BATTLE_STARTED: &str = "battle_started";
pub const SESSION_FINISHED: &str = "session_finished";
pub const SESSION_JUDGEMENT: &str = "session_judgement";
pub const METADATA_UPDATED: &str = "metadata_updated";
pub const WEAPONS_DETECTED: &str = "weapons_detected";
pub const RECORDING_STARTED: &str = "recording_started";
pub const RECORDING_PAUSED: &str = "recording_paused";
pub const RECORDING_RESUMED: &str = "recording_resumed";
pub const RECORDING_STOPPED: &str = "recording_stopped";
pub const RECORDING_CANCELLED: &str = "recording_cancelled";
pub const SESSION_COMPLETED: &str = "session_completed";
pub const SESSION_CANCELLED: &str = "session_cancelled";
pub const RECORDER_ERROR: &str = "recorder_error";
pub const POWER_OFF_DETECTED: &str = "power_off_detected";

/// Wire shape: `{type, payload, id, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Event without payload
    pub fn bare(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Map::new())
    }

    /// Build from any JSON value; non-object values land under `"value"`
    pub fn from_value(event_type: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(event_type, payload)
    }
}
