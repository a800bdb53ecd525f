use crate::domain::alert::{Alert, AlertKind, AlertPriority};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-subscriber delivery filter. Empty filter receives everything.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub symbol: Option<String>,
    pub kind: Option<AlertKind>,
    pub min_priority: Option<AlertPriority>,
}

impl AlertFilter {
    fn matches(&self, alert: &Alert) -> bool {
        if let Some(symbol) = &self.symbol {
            if !alert.symbol.eq_ignore_ascii_case(symbol) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if alert.kind != kind {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if alert.priority < min {
                return false;
            }
        }
        true
    }
}

/// What a subscriber receives: an alert, or a marker counting alerts dropped
/// while its queue was full.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Alert(Alert),
    Dropped { count: u64 },
}

struct SubscriberInner {
    queue: VecDeque<Alert>,
    dropped: u64,
}

struct Subscriber {
    id: u64,
    filter: AlertFilter,
    inner: Mutex<SubscriberInner>,
    notify: Notify,
    depth: usize,
}

/// Handle returned by `subscribe`. Dropping it (after `unsubscribe`) detaches
/// the queue from the bus.
pub struct Subscription {
    pub id: u64,
    subscriber: Arc<Subscriber>,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    /// Awaits the next message. `None` once the bus is shut down and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            {
                let mut inner = self.subscriber.inner.lock().await;
                if inner.dropped > 0 {
                    let count = inner.dropped;
                    inner.dropped = 0;
                    return Some(BusMessage::Dropped { count });
                }
                if let Some(alert) = inner.queue.pop_front() {
                    return Some(BusMessage::Alert(alert));
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.subscriber.notify.notified().await;
        }
    }
}

/// Fans alerts out to live subscribers over independent bounded queues and
/// retains a ring buffer of the most recent alerts.
///
/// A full subscriber queue drops its oldest pending alert; the subscriber
/// later receives a `Dropped` marker. No subscriber can block the producer.
pub struct AlertBus {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    ring: RwLock<VecDeque<Alert>>,
    ring_capacity: usize,
    queue_depth: usize,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    overflow_total: AtomicU64,
}

impl AlertBus {
    pub fn new(ring_capacity: usize, queue_depth: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            ring: RwLock::new(VecDeque::with_capacity(ring_capacity)),
            ring_capacity,
            queue_depth: queue_depth.max(1),
            next_id: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(false)),
            overflow_total: AtomicU64::new(0),
        }
    }

    pub async fn subscribe(&self, filter: AlertFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            filter,
            inner: Mutex::new(SubscriberInner {
                queue: VecDeque::with_capacity(self.queue_depth),
                dropped: 0,
            }),
            notify: Notify::new(),
            depth: self.queue_depth,
        });

        self.subscribers.write().await.push(Arc::clone(&subscriber));
        debug!("AlertBus: subscriber {} attached", id);

        Subscription {
            id,
            subscriber,
            closed: Arc::clone(&self.closed),
        }
    }

    pub async fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
            let subscriber = subscribers.swap_remove(pos);
            subscriber.notify.notify_waiters();
            debug!("AlertBus: subscriber {} detached", id);
        }
    }

    /// Delivers one alert to the ring buffer and every matching subscriber.
    pub async fn publish(&self, alert: Alert) {
        {
            let mut ring = self.ring.write().await;
            if ring.len() == self.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(alert.clone());
        }

        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.iter() {
            if !subscriber.filter.matches(&alert) {
                continue;
            }
            let mut inner = subscriber.inner.lock().await;
            if inner.queue.len() >= subscriber.depth {
                inner.queue.pop_front();
                inner.dropped += 1;
                self.overflow_total.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "AlertBus: subscriber {} queue full, dropped oldest alert",
                    subscriber.id
                );
            }
            inner.queue.push_back(alert.clone());
            subscriber.notify.notify_one();
        }
    }

    /// The newest alerts, most recent first, at most `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<Alert> {
        let ring = self.ring.read().await;
        ring.iter().rev().take(limit).cloned().collect()
    }

    /// Marks a retained alert as read. Returns false for unknown ids.
    pub async fn mark_read(&self, id: Uuid) -> bool {
        let mut ring = self.ring.write().await;
        match ring.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.read = true;
                true
            }
            None => false,
        }
    }

    /// Total alerts dropped across all subscribers since startup.
    pub fn overflow_total(&self) -> u64 {
        self.overflow_total.load(Ordering::Relaxed)
    }

    /// Shuts the bus down: subscribers drain their queues and then observe
    /// end-of-stream.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.iter() {
            subscriber.notify.notify_waiters();
        }
        info!("AlertBus: closed ({} subscribers)", subscribers.len());
    }
}
