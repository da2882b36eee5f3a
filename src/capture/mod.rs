//! Frame capture
//!
//! Frame type, the blocking frame source abstraction, and the worker that
//! bridges it into the async orchestrator.

pub mod producer;
pub mod traits;

pub use producer::{FrameProducer, LatestFrameSlot};
pub use traits::{Frame, FrameSource, PixelFormat};
