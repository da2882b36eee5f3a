//! Frame capture producer
//!
//! A dedicated thread pulls frames from a blocking [`FrameSource`] and hands
//! the newest one to the orchestrator through a single-slot, latest-wins
//! handoff. The capture thread never waits on the consumer.

use super::traits::{Frame, FrameSource};
use crate::config::Settings;
use crate::runtime::FrameHub;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Single-slot handoff; a new frame replaces whatever is still queued.
#[derive(Default)]
pub struct LatestFrameSlot {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
    notify: Notify,
    dropped: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `frame`, evicting a frame nobody consumed yet
    pub fn put(&self, frame: Frame) {
        let evicted = self.slot.lock().replace(frame);
        if evicted.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
        self.notify.notify_one();
    }

    /// Take the queued frame without waiting
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }

    /// Block the calling thread until a frame arrives or `timeout` elapses
    pub fn take_blocking(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }

    /// Wait asynchronously until a frame arrives or `timeout` elapses
    pub async fn take_async(&self, timeout: Duration) -> Option<Frame> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if let Some(frame) = self.take() {
                    return frame;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }

    /// Frames that were replaced before anyone consumed them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the capture worker thread
pub struct FrameProducer {
    slot: Arc<LatestFrameSlot>,
    running: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl FrameProducer {
    /// Spawn with the configured capture retry backoff
    pub fn from_settings<S: FrameSource>(
        source: S,
        hub: Arc<FrameHub>,
        settings: &Settings,
    ) -> std::io::Result<Self> {
        Self::spawn(source, hub, settings.capture_retry_backoff())
    }

    /// Spawn the capture thread for `source`
    pub fn spawn<S: FrameSource>(
        mut source: S,
        hub: Arc<FrameHub>,
        retry_backoff: Duration,
    ) -> std::io::Result<Self> {
        let slot = Arc::new(LatestFrameSlot::new());
        let running = Arc::new(AtomicBool::new(true));
        let captured = Arc::new(AtomicU64::new(0));

        let worker_slot = slot.clone();
        let worker_running = running.clone();
        let worker_captured = captured.clone();

        tracing::info!("Starting frame capture from {}", source.id());

        let handle = std::thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || {
                while worker_running.load(Ordering::SeqCst) {
                    match source.capture() {
                        Ok(frame) => {
                            hub.publish(&frame);
                            worker_slot.put(frame);

                            let count = worker_captured.fetch_add(1, Ordering::Relaxed) + 1;
                            if count % 600 == 0 {
                                tracing::debug!(
                                    "Captured {} frames, {} dropped",
                                    count,
                                    worker_slot.dropped()
                                );
                            }
                        }
                        Err(e) => {
                            tracing::debug!("Capture from {} failed: {:#}", source.id(), e);
                            std::thread::sleep(retry_backoff);
                        }
                    }
                }
                tracing::info!("Frame capture from {} stopped", source.id());
            })?;

        Ok(Self {
            slot,
            running,
            captured,
            handle: Some(handle),
        })
    }

    /// Blocking pull with timeout; call off the async scheduler
    pub fn get_frame(&self, timeout: Duration) -> Option<Frame> {
        self.slot.take_blocking(timeout)
    }

    /// Newest queued frame, never blocks
    pub fn latest(&self) -> Option<Frame> {
        self.slot.take()
    }

    /// Async pull with timeout, used by the orchestrator
    pub async fn next_frame(&self, timeout: Duration) -> Option<Frame> {
        self.slot.take_async(timeout).await
    }

    pub fn slot(&self) -> Arc<LatestFrameSlot> {
        self.slot.clone()
    }

    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.slot.dropped()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for the in-flight capture to return
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Frame capture thread panicked");
            }
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.stop();
    }
}
