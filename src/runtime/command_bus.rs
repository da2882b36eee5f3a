//! Command bus
//!
//! Lets code outside the orchestrator (a UI action, a hotkey) submit named
//! commands. Requests are queued and executed inside the orchestrator task;
//! the caller gets a handle that resolves with the result.

use crate::config::Settings;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command queue is full")]
    QueueFull,

    #[error("Command receiver is gone")]
    Closed,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Command failed: {0}")]
    Failed(String),
}

pub type CommandResult = Result<Value, CommandError>;

/// A queued request, consumed by the orchestrator
#[derive(Debug)]
pub struct CommandRequest {
    pub name: String,
    pub payload: Value,
    reply: oneshot::Sender<CommandResult>,
}

impl CommandRequest {
    /// Send the result back to the submitter
    pub fn respond(self, result: CommandResult) {
        if self.reply.send(result).is_err() {
            tracing::debug!("Submitter of {} went away before the reply", self.name);
        }
    }
}

/// Resolves with the result of a submitted command
pub struct CommandHandle {
    rx: Option<oneshot::Receiver<CommandResult>>,
    error: Option<CommandError>,
}

impl Future for CommandHandle {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(error) = self.error.take() {
            return Poll::Ready(Err(error));
        }
        match self.rx.as_mut() {
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(CommandError::Closed))),
            None => Poll::Ready(Err(CommandError::Closed)),
        }
    }
}

/// Submitting side, cloneable across tasks and threads
#[derive(Clone)]
pub struct CommandBus {
    tx: mpsc::Sender<CommandRequest>,
}

/// Receiving side, owned by the orchestrator
pub struct CommandReceiver {
    rx: mpsc::Receiver<CommandRequest>,
}

impl CommandBus {
    pub fn new(capacity: usize) -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, CommandReceiver { rx })
    }

    /// Bus sized by `commandQueueCapacity`
    pub fn from_settings(settings: &Settings) -> (Self, CommandReceiver) {
        Self::new(settings.command_queue_capacity)
    }

    /// Queue a command without waiting. Never blocks the caller.
    pub fn submit(&self, name: impl Into<String>, payload: Value) -> CommandHandle {
        let (reply, rx) = oneshot::channel();
        let request = CommandRequest {
            name: name.into(),
            payload,
            reply,
        };
        match self.tx.try_send(request) {
            Ok(()) => CommandHandle {
                rx: Some(rx),
                error: None,
            },
            Err(mpsc::error::TrySendError::Full(request)) => {
                tracing::warn!("Command queue full, rejecting {}", request.name);
                CommandHandle {
                    rx: None,
                    error: Some(CommandError::QueueFull),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => CommandHandle {
                rx: None,
                error: Some(CommandError::Closed),
            },
        }
    }

    /// Submit and wait for the result
    pub async fn dispatch(&self, name: impl Into<String>, payload: Value) -> CommandResult {
        self.submit(name, payload).await
    }
}

impl CommandReceiver {
    pub fn try_recv(&mut self) -> Option<CommandRequest> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<CommandRequest> {
        self.rx.recv().await
    }
}
