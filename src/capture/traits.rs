//! Capture trait definitions
//!
//! Platform-agnostic frame type and the frame source abstraction.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_FRAME_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra,
    Rgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra => 4,
            PixelFormat::Rgb => 3,
        }
    }
}

/// A single decoded image sampled from the live feed.
///
/// Cloning is cheap: pixel data is shared.
#[derive(Clone)]
pub struct Frame {
    seq: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self::captured_at(width, height, format, data, Utc::now())
    }

    /// Create a frame with an explicit capture timestamp
    pub fn captured_at(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: NEXT_FRAME_SEQ.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            format,
            data: data.into(),
            captured_at,
        }
    }

    /// Process-wide capture order
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Whether the buffer holds at least `width * height` pixels
    pub fn is_complete(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        self.data.len() >= expected
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Something that hands out frames on demand, e.g. a capture card.
///
/// `capture` may block; it is only ever called from the capture worker thread.
pub trait FrameSource: Send + 'static {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Block until the next frame is available
    fn capture(&mut self) -> anyhow::Result<Frame>;
}
