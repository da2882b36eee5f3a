//! Recorder port
//!
//! The recording device (an OBS-like process) is driven through this trait.
//! The orchestrator is the only caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether retrying the same operation can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Fatal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Recorder unreachable: {0}")]
    Unreachable(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Recorder rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    #[error("Recorder timed out during {0}")]
    Timeout(String),
}

impl RecorderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RecorderError::Unreachable(_) => FailureKind::Fatal,
            RecorderError::AlreadyRecording
            | RecorderError::NotRecording
            | RecorderError::Rejected { .. }
            | RecorderError::Timeout(_) => FailureKind::Transient,
        }
    }
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Artifacts of a finished recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    /// Files written by the recorder
    pub output_files: Vec<String>,
}

/// Recording device control.
///
/// Implementations should treat a request for the state the device is already
/// in as a success, or report a descriptive error.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Connect to the device. Failure here is fatal for the orchestrator.
    async fn setup(&self) -> RecorderResult<()>;

    async fn start(&self) -> RecorderResult<()>;

    async fn pause(&self) -> RecorderResult<()>;

    async fn resume(&self) -> RecorderResult<()>;

    /// Stop and return the written artifacts
    async fn stop(&self) -> RecorderResult<RecordingOutput>;

    /// Stop and discard the recording
    async fn cancel(&self) -> RecorderResult<()> {
        let output = self.stop().await?;
        for file in &output.output_files {
            if let Err(e) = tokio::fs::remove_file(file).await {
                tracing::warn!("Failed to remove cancelled recording {}: {}", file, e);
            }
        }
        Ok(())
    }

    /// Release the device connection
    async fn teardown(&self) -> RecorderResult<()>;
}
