//! Frame processing service
//!
//! Cross-cutting checks the phase handlers do not own: frame acquisition with
//! failures folded into `None`, and the periodic power-off heuristic.

use crate::analyzer::FrameAnalyzer;
use crate::capture::{Frame, LatestFrameSlot};
use crate::runtime::{events, EventPublisher};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a power-off poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOffStatus {
    /// Not polled this cycle (inside the interval window)
    Skipped,
    /// Polled, nothing detected; counter reset
    Clear,
    /// Positive, but below the threshold
    Pending(u32),
    /// Threshold reached
    Final,
}

pub struct FrameProcessingService {
    frames: Arc<LatestFrameSlot>,
    analyzer: Arc<dyn FrameAnalyzer>,
    events: EventPublisher,
    interval: chrono::Duration,
    threshold: u32,
    last_poll: Option<DateTime<Utc>>,
    consecutive: u32,
}

impl FrameProcessingService {
    pub fn new(
        frames: Arc<LatestFrameSlot>,
        analyzer: Arc<dyn FrameAnalyzer>,
        events: EventPublisher,
        interval: Duration,
        threshold: u32,
    ) -> Self {
        Self {
            frames,
            analyzer,
            events,
            interval: chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(5)),
            threshold: threshold.max(1),
            last_poll: None,
            consecutive: 0,
        }
    }

    /// Next frame, or `None` on timeout
    pub async fn acquire(&self, timeout: Duration) -> Option<Frame> {
        let frame = self.frames.take_async(timeout).await?;
        if !frame.is_complete() {
            tracing::debug!("Discarding truncated frame {}", frame.seq());
            return None;
        }
        Some(frame)
    }

    /// Poll the power-off detector at most once per interval.
    ///
    /// The window is measured on frame timestamps, so skipped frames do not
    /// shift it.
    pub async fn check_power_off(&mut self, frame: &Frame) -> PowerOffStatus {
        let now = frame.timestamp();
        if let Some(last) = self.last_poll {
            if now - last < self.interval {
                return PowerOffStatus::Skipped;
            }
        }
        self.last_poll = Some(now);

        let positive = match self.analyzer.detect_power_off(frame).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Power-off detection failed: {}", e);
                false
            }
        };

        if !positive {
            if self.consecutive > 0 {
                tracing::debug!("Power-off streak broken at {}", self.consecutive);
            }
            self.consecutive = 0;
            return PowerOffStatus::Clear;
        }

        self.consecutive += 1;
        let is_final = self.consecutive >= self.threshold;
        self.events.emit_value(
            events::POWER_OFF_DETECTED,
            json!({ "final": is_final, "count": self.consecutive }),
        );

        if is_final {
            tracing::info!("Power-off confirmed after {} polls", self.consecutive);
            self.consecutive = 0;
            PowerOffStatus::Final
        } else {
            PowerOffStatus::Pending(self.consecutive)
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
