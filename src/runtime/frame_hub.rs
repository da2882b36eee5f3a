//! Live preview hub
//!
//! Keeps the single latest published frame and notifies preview listeners.

use crate::capture::Frame;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type FrameListener = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Handle returned by [`FrameHub::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct FrameHub {
    latest: RwLock<Option<Frame>>,
    listeners: RwLock<Vec<(ListenerId, FrameListener)>>,
    next_id: AtomicU64,
}

impl FrameHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the latest one and hand it to every listener.
    ///
    /// A panicking listener is logged and skipped; the others still run.
    pub fn publish(&self, frame: &Frame) {
        *self.latest.write() = Some(frame.clone());

        // Snapshot so listeners can (un)register from inside a callback
        let listeners: Vec<(ListenerId, FrameListener)> = self.listeners.read().clone();
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(frame))).is_err() {
                tracing::warn!("Frame listener {:?} panicked, skipping", id);
            }
        }
    }

    pub fn latest(&self) -> Option<Frame> {
        self.latest.read().clone()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the listener was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}
