use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

/// Handle identifying one push-channel connection.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Subscriber = mpsc::Sender<String>;

/// A registered connection: its id plus the queue the bus delivers into.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<String>,
}

/// Fan-out of status messages to every connected subscriber.
///
/// Registration is keyed by [`SubscriberId`], so registering the same id
/// twice keeps a single entry. Subscribers whose queue is closed are dropped
/// during the next broadcast.
pub struct BroadcastBus {
    subscribers: Arc<RwLock<BTreeMap<SubscriberId, Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Mints a new id and registers a fresh queue for it.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id();
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribe_with(id, tx).await;
        Subscription { id, receiver: rx }
    }

    /// Registers `sender` under `id`. Returns `false` and keeps the existing
    /// registration when `id` is already subscribed.
    pub async fn subscribe_with(&self, id: SubscriberId, sender: Subscriber) -> bool {
        let mut subs = self.subscribers.write().await;
        if subs.contains_key(&id) {
            return false;
        }
        subs.insert(id, sender);
        tracing::debug!(subscriber = %id, total = subs.len(), "subscriber connected");
        true
    }

    /// Removes `id`. Unknown or already removed ids are a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "subscriber disconnected");
        }
        removed
    }

    /// Delivers `message` to every subscriber and returns how many received
    /// it. Closed subscribers are removed; a full queue only loses this
    /// message.
    pub async fn broadcast(&self, message: impl Into<String>) -> usize {
        let message = message.into();
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subs = self.subscribers.read().await;
            for (id, tx) in subs.iter() {
                match tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = %id, "subscriber queue full, dropping message");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for id in closed {
                subs.remove(&id);
                tracing::debug!(subscriber = %id, "removed closed subscriber");
            }
        }

        delivered
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn broadcast_to_no_subscribers_succeeds() {
        let bus = BroadcastBus::new(8);
        assert_eq!(bus.broadcast("{\"status\":\"running\"}").await, 0);
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = BroadcastBus::new(8);
        let mut sub = bus.subscribe().await;

        bus.broadcast("hello").await;

        let received = timeout(Duration::from_millis(100), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "hello");
    }

    #[tokio::test]
    async fn each_subscriber_receives_exactly_once() {
        let bus = BroadcastBus::new(8);
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(bus.subscribe().await);
        }

        assert_eq!(bus.broadcast("payload").await, 3);

        for sub in &mut subs {
            let got = timeout(Duration::from_millis(100), sub.receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, "payload");
            assert!(sub.receiver.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_ignored() {
        let bus = BroadcastBus::new(8);
        let id = bus.next_id();
        let (tx, mut rx) = mpsc::channel(8);

        assert!(bus.subscribe_with(id, tx.clone()).await);
        assert!(!bus.subscribe_with(id, tx).await);
        assert_eq!(bus.len().await, 1);

        assert_eq!(bus.broadcast("once").await, 1);
        assert_eq!(rx.recv().await.unwrap(), "once");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = BroadcastBus::new(8);
        let sub = bus.subscribe().await;

        assert!(bus.unsubscribe(sub.id).await);
        assert!(!bus.unsubscribe(sub.id).await);
        assert!(!bus.unsubscribe(bus.next_id()).await);
        assert_eq!(bus.broadcast("nobody").await, 0);
        assert!(bus.is_empty().await);
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed_on_broadcast() {
        let bus = BroadcastBus::new(8);
        let gone = bus.subscribe().await;
        let mut alive = bus.subscribe().await;
        drop(gone.receiver);

        assert_eq!(bus.broadcast("still here").await, 1);
        assert_eq!(bus.len().await, 1);
        assert_eq!(alive.receiver.recv().await.unwrap(), "still here");
    }

    #[tokio::test]
    async fn full_queue_drops_message_but_keeps_subscriber() {
        let bus = BroadcastBus::new(1);
        let mut sub = bus.subscribe().await;

        assert_eq!(bus.broadcast("first").await, 1);
        assert_eq!(bus.broadcast("second").await, 0);
        assert_eq!(bus.len().await, 1);

        assert_eq!(sub.receiver.recv().await.unwrap(), "first");
        let second = timeout(Duration::from_millis(50), sub.receiver.recv()).await;
        assert!(second.is_err());
    }
}
