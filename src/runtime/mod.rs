//! Runtime messaging
//!
//! Publish/subscribe substrate that decouples the orchestrator from its
//! observers, plus the command path back into the orchestrator.

pub mod command_bus;
pub mod event_bus;
pub mod events;
pub mod frame_hub;
pub mod publisher;

pub use command_bus::{CommandBus, CommandError, CommandHandle, CommandReceiver, CommandRequest, CommandResult};
pub use event_bus::{EventBus, OverflowPolicy, Subscription};
pub use events::Event;
pub use frame_hub::{FrameHub, ListenerId};
pub use publisher::{EventPublisher, PublisherWorker};
