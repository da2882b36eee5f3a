//! Recording device module
//!
//! - `Recorder` port implemented by recording backends
//! - `SessionStateMachine` over the coarse recorder states
//! - `RecordingTimeline` tracking pause/resume segments

pub mod port;
pub mod state;

pub use port::{FailureKind, Recorder, RecorderError, RecorderResult, RecordingOutput};
pub use state::{RecordState, RecordingTimeline, SessionStateMachine, StateEvent};
