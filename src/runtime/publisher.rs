//! Publisher worker
//!
//! Moves event emission off the orchestrator task. The orchestrator only ever
//! does a `try_send` into a bounded queue; a separate task forwards the
//! events to the [`EventBus`].

use super::event_bus::EventBus;
use super::events::Event;
use crate::config::Settings;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Cheap handle used by handlers and the orchestrator to announce events
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventPublisher {
    /// Wrap an existing queue; whoever owns the receiver does the forwarding
    pub fn from_sender(tx: mpsc::Sender<Event>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue `event`; drops it if the queue is full or the worker stopped
    pub fn publish(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Event queue full, dropping {}", event.event_type);
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Publisher stopped, dropping {}", event.event_type);
                false
            }
        }
    }

    pub fn emit(&self, event_type: &str, payload: Map<String, Value>) -> bool {
        self.publish(Event::new(event_type, payload))
    }

    pub fn emit_value(&self, event_type: &str, payload: Value) -> bool {
        self.publish(Event::from_value(event_type, payload))
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the forwarding task
pub struct PublisherWorker {
    publisher: EventPublisher,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl PublisherWorker {
    /// Spawn with the configured queue capacity
    pub fn from_settings(bus: EventBus, settings: &Settings) -> Self {
        Self::spawn(bus, settings.publisher_queue_capacity)
    }

    /// Spawn the worker on the current tokio runtime
    pub fn spawn(bus: EventBus, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut delivered = 0u64;
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Some(event) => {
                            bus.publish(event);
                            delivered += 1;
                        }
                        None => break,
                    },
                    _ = &mut shutdown_rx => {
                        // Refuse new events, flush what is already queued
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            bus.publish(event);
                            delivered += 1;
                        }
                        break;
                    }
                }
            }
            tracing::info!("Publisher worker stopped after {} events", delivered);
            delivered
        });

        Self {
            publisher: EventPublisher::from_sender(tx),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Drain queued events, then stop. Returns the number of events delivered.
    pub async fn stop(&mut self) -> u64 {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                tracing::error!("Publisher worker failed: {}", e);
                0
            }),
            None => 0,
        }
    }
}
