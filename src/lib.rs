//! Battle Recorder - game sessions recorded automatically from what is on screen.
//!
//! Frames come in from a capture device, a per-phase handler decides what the
//! recorder should do, and the orchestrator executes that decision and
//! announces it to observers.

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Settings;
pub use session::{LoopExit, Orchestrator};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "battle_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Battle Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
