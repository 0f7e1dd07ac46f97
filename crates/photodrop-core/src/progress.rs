//! In-memory publish/subscribe for per-asset completion events.
//!
//! Delivery is best-effort and at-most-once: every subscriber owns a bounded
//! mailbox, publishing never waits, and an event that does not fit in a
//! subscriber's mailbox is dropped for that subscriber only. Events published
//! before a subscription was opened are never replayed.

use futures_util::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::ProgressConfig;
use crate::types::{BatchId, ProgressEvent};

/// Identifier of one subscription.
pub type SubscriberId = u64;

struct Subscriber {
    /// `None` receives every batch
    scope: Option<BatchId>,
    sender: mpsc::Sender<ProgressEvent>,
}

struct Inner {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    mailbox_capacity: usize,
}

impl Inner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fan-out of [`ProgressEvent`]s to any number of subscribers.
///
/// Cheap to clone; clones publish to the same subscriber table.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    inner: Arc<Inner>,
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(&ProgressConfig::default())
    }
}

impl ProgressBroadcaster {
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                mailbox_capacity: config.mailbox_capacity.max(1),
            }),
        }
    }

    /// Receive events for one batch.
    pub fn subscribe(&self, batch_id: BatchId) -> Subscription {
        self.register(Some(batch_id))
    }

    /// Receive events for every batch.
    pub fn subscribe_all(&self) -> Subscription {
        self.register(None)
    }

    fn register(&self, scope: Option<BatchId>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.mailbox_capacity);
        self.inner
            .subscribers()
            .insert(id, Subscriber { scope, sender });
        tracing::trace!(subscriber = id, ?scope, "Progress subscriber added");

        Subscription {
            id,
            receiver,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Detach a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.subscribers().remove(&id).is_some()
    }

    /// Deliver an event to every interested subscriber without blocking.
    ///
    /// Returns how many subscribers received it. Subscribers whose handle
    /// has been dropped are pruned here.
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        let mut subscribers = self.inner.subscribers();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, subscriber) in subscribers.iter() {
            if subscriber.scope.is_some_and(|scope| scope != event.batch_id) {
                continue;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(subscriber = id, "Progress mailbox full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<ProgressEvent>,
    broadcaster: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. `None` once the subscription is detached
    /// and its mailbox drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Take the next buffered event, if any.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broadcaster.upgrade() {
            inner.subscribers().remove(&self.id);
        }
    }
}
