//! Fan-out of push messages to connected subscribers.
//!
//! Each subscriber owns a bounded queue. Broadcasting never waits on a
//! subscriber: when a queue is full its oldest message is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::domain::market::Market;
use crate::domain::position::Position;
use crate::domain::trade::Trade;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushMessage {
    MarketUpdate {
        markets: Vec<Market>,
        timestamp: DateTime<Utc>,
    },
    TradeExecuted {
        trade: Trade,
        position: Position,
    },
    PositionClosed {
        position: Position,
    },
}

struct SubscriberQueue {
    messages: Mutex<VecDeque<Arc<str>>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, message: Arc<str>, capacity: usize) {
        {
            let mut messages = lock(&self.messages);
            if messages.len() >= capacity {
                messages.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            messages.push_back(message);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A registered subscriber's end of its queue.
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next queued message, or `None` once the subscriber is removed or the
    /// registry shuts down.
    pub async fn recv(&self) -> Option<Arc<str>> {
        loop {
            let notified = self.queue.notify.notified();
            let next = lock(&self.queue.messages).pop_front();
            if let Some(message) = next {
                return Some(message);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Messages discarded because this subscriber fell behind.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    subscribers: HashMap<u64, Arc<SubscriberQueue>>,
    shut_down: bool,
}

pub struct SubscriberRegistry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl SubscriberRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Registers a subscriber. After shutdown the returned subscription is
    /// already closed.
    pub fn add(&self) -> Subscription {
        let queue = Arc::new(SubscriberQueue::new(self.capacity));
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        if inner.shut_down {
            queue.close();
        } else {
            inner.subscribers.insert(id, Arc::clone(&queue));
            debug!(subscriber = id, total = inner.subscribers.len(), "subscriber added");
        }
        Subscription { id, queue }
    }

    pub fn remove(&self, id: u64) {
        let removed = lock(&self.inner).subscribers.remove(&id);
        if let Some(queue) = removed {
            queue.close();
            debug!(subscriber = id, "subscriber removed");
        }
    }

    /// Queues `message` for every subscriber. Returns how many received it.
    pub fn broadcast(&self, message: &PushMessage) -> usize {
        let payload: Arc<str> = match serde_json::to_string(message) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(error = %e, "failed to encode push message");
                return 0;
            }
        };

        let inner = lock(&self.inner);
        for queue in inner.subscribers.values() {
            queue.push(Arc::clone(&payload), self.capacity);
        }
        inner.subscribers.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every subscription and refuses new ones.
    pub fn shutdown(&self) {
        let mut inner = lock(&self.inner);
        inner.shut_down = true;
        for (_, queue) in inner.subscribers.drain() {
            queue.close();
        }
    }
}
