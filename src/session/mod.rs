//! Session orchestration
//!
//! - `RecordingContext` snapshots and the `RecordingCommand` decisions built from them
//! - `SessionPhase` classification and the per-phase handlers
//! - `Orchestrator` loop that executes decisions against the recorder

pub mod command;
pub mod context;
pub mod frame_processing;
pub mod handlers;
pub mod orchestrator;
pub mod phase;
pub mod registry;

pub use command::{RecordingAction, RecordingCommand};
pub use context::{RecordingContext, ResumeTrigger, SessionMetadata, WeaponDetectionState};
pub use frame_processing::{FrameProcessingService, PowerOffStatus};
pub use handlers::{HandlerDeps, PhaseHandler};
pub use orchestrator::{LoopExit, Orchestrator};
pub use phase::SessionPhase;
pub use registry::PhaseHandlerRegistry;
