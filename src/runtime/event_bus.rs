//! In-process event bus
//!
//! Fan-out to any number of subscriptions. Each subscription owns a bounded
//! queue with its own overflow policy, so publishing never waits on a slow
//! subscriber.

use super::events::Event;
use crate::config::Settings;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;

/// What a full subscription queue does with a new event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event
    #[default]
    DropOldest,
    /// Discard the incoming event
    DropNewest,
}

struct SubscriptionShared {
    queue: Mutex<VecDeque<Event>>,
    capacity: usize,
    policy: OverflowPolicy,
    filter: Option<HashSet<String>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl SubscriptionShared {
    fn accepts(&self, event_type: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |types| types.contains(event_type))
    }

    fn push(&self, event: Event) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        queue.pop_front();
                    }
                    OverflowPolicy::DropNewest => return,
                }
            }
            queue.push_back(event);
        }
        self.notify.notify_one();
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    shared: Arc<SubscriptionShared>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<Event> {
        self.shared.queue.lock().pop_front()
    }

    /// Wait for the next event; `None` once the bus is gone and the queue is empty
    pub async fn recv(&self) -> Option<Event> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    pub async fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Everything currently queued
    pub fn drain(&self) -> Vec<Event> {
        self.shared.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events lost to the overflow policy
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

struct BusInner {
    subscribers: RwLock<Vec<Weak<SubscriptionShared>>>,
    published: AtomicU64,
    /// Queue size of subscriptions that do not pick their own
    default_capacity: usize,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        for subscriber in self.subscribers.get_mut().iter().filter_map(Weak::upgrade) {
            subscriber.closed.store(true, Ordering::SeqCst);
            subscriber.notify.notify_one();
        }
    }
}

/// Cloneable handle to a shared bus
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity(Settings::default().subscription_capacity)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_default_capacity(settings.subscription_capacity)
    }

    fn with_default_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                published: AtomicU64::new(0),
                default_capacity: capacity.max(1),
            }),
        }
    }

    /// Subscribe to every event type with the configured queue size
    pub fn subscribe_default(&self, policy: OverflowPolicy) -> Subscription {
        self.subscribe(self.inner.default_capacity, policy)
    }

    /// Subscribe to every event type
    pub fn subscribe(&self, capacity: usize, policy: OverflowPolicy) -> Subscription {
        self.add_subscription(None, capacity, policy)
    }

    /// Subscribe to the listed event types only
    pub fn subscribe_to<I, S>(&self, types: I, capacity: usize, policy: OverflowPolicy) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = types.into_iter().map(Into::into).collect();
        self.add_subscription(Some(filter), capacity, policy)
    }

    fn add_subscription(
        &self,
        filter: Option<HashSet<String>>,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Subscription {
        let shared = Arc::new(SubscriptionShared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            policy,
            filter,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        self.inner.subscribers.write().push(Arc::downgrade(&shared));
        Subscription { shared }
    }

    /// Deliver `event` to every matching subscription without waiting
    pub fn publish(&self, event: Event) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut stale = false;
        for weak in self.inner.subscribers.read().iter() {
            match weak.upgrade() {
                Some(subscriber) if subscriber.accepts(&event.event_type) => {
                    subscriber.push(event.clone())
                }
                Some(_) => {}
                None => stale = true,
            }
        }

        if stale {
            self.inner
                .subscribers
                .write()
                .retain(|weak| weak.strong_count() > 0);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}
