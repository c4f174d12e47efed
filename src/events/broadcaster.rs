//! Non-blocking event fan-out to connected subscribers.
//!
//! The [`Broadcaster`] owns the set of live subscriber channels. Delivery is
//! best-effort: every enqueue uses `try_send`, so one slow or disconnected
//! subscriber never blocks producers or delivery to the other subscribers.
//! A channel that rejects an event is dropped from the set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::event::BroadcastEvent;

/// Per-subscriber queue depth. Large enough that only a consumer that has
/// stopped reading for a long while ever overflows.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// One subscriber's end of the fan-out.
///
/// Dropping the receiver closes the channel; the broadcaster notices on the
/// next delivery attempt and prunes the entry, but callers that terminate
/// cleanly should also call [`Broadcaster::unsubscribe`] with `id`.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<BroadcastEvent>,
}

/// Registry of live subscriber channels with best-effort broadcast.
pub struct Broadcaster {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<BroadcastEvent>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber channel.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .insert(id, sender);
        debug!("Subscriber {} connected", id);
        Subscription { id, receiver }
    }

    /// Remove a subscriber channel. Idempotent: unknown ids are a no-op.
    pub fn unsubscribe(&self, id: u64) {
        let removed = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .remove(&id);
        if removed.is_some() {
            debug!("Subscriber {} disconnected", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .len()
    }

    /// Push an event to every registered channel.
    ///
    /// The registry lock is held only to snapshot the sender list, never
    /// during delivery, so subscribers are not serialized behind each other.
    /// Channels that are full or closed are logged and unsubscribed.
    pub fn broadcast(&self, event: &BroadcastEvent) {
        let senders: Vec<(u64, mpsc::Sender<BroadcastEvent>)> = {
            let subscribers = self
                .subscribers
                .lock()
                .expect("subscriber registry poisoned");
            subscribers
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect()
        };

        let mut broken = Vec::new();
        for (id, sender) in senders {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "Subscriber {} queue full, dropping it ({} event lost)",
                        id,
                        event.kind()
                    );
                    broken.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Subscriber {} channel closed, dropping it", id);
                    broken.push(id);
                }
            }
        }
        for id in broken {
            self.unsubscribe(id);
        }
    }

    /// Push the terminal shutdown sentinel to every channel and clear the set.
    ///
    /// Channels that cannot accept the sentinel are skipped, not retried;
    /// clearing the registry drops their senders, so those sessions observe
    /// channel-closed on their next wake and terminate anyway.
    pub fn shutdown(&self) {
        let senders: Vec<(u64, mpsc::Sender<BroadcastEvent>)> = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .drain()
            .collect();
        info!("Shutting down broadcaster, {} subscriber(s)", senders.len());
        for (id, sender) in senders {
            if sender.try_send(BroadcastEvent::shutdown()).is_err() {
                debug!("Subscriber {} missed the shutdown event", id);
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_event(id: &str) -> BroadcastEvent {
        BroadcastEvent::Delete { id: id.to_string() }
    }

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.broadcast(&delete_event("a"));

        assert_eq!(first.receiver.recv().await, Some(delete_event("a")));
        assert_eq!(second.receiver.recv().await, Some(delete_event("a")));
    }

    #[tokio::test]
    async fn unsubscribed_channel_receives_nothing_more() {
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.subscribe();

        broadcaster.broadcast(&delete_event("a"));
        broadcaster.unsubscribe(subscription.id);
        broadcaster.broadcast(&delete_event("b"));

        assert_eq!(subscription.receiver.recv().await, Some(delete_event("a")));
        // Sender dropped on unsubscribe, channel drains then closes.
        assert_eq!(subscription.receiver.recv().await, None);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let subscription = broadcaster.subscribe();
        broadcaster.unsubscribe(subscription.id);
        broadcaster.unsubscribe(subscription.id);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closed_channel_is_pruned_without_breaking_others() {
        let broadcaster = Broadcaster::new();
        let dropped = broadcaster.subscribe();
        let mut alive = broadcaster.subscribe();
        drop(dropped.receiver);

        broadcaster.broadcast(&delete_event("a"));

        assert_eq!(alive.receiver.recv().await, Some(delete_event("a")));
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn full_queue_evicts_the_slow_subscriber_only() {
        let broadcaster = Broadcaster::new();
        let slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        // Fill both queues to the brim, draining only the fast one.
        for i in 0..SUBSCRIBER_QUEUE_CAPACITY {
            broadcaster.broadcast(&delete_event(&i.to_string()));
            fast.receiver.recv().await.unwrap();
        }
        assert_eq!(broadcaster.subscriber_count(), 2);

        // One more event overflows the unread queue.
        broadcaster.broadcast(&delete_event("overflow"));

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(fast.receiver.recv().await, Some(delete_event("overflow")));
        drop(slow);
    }

    #[tokio::test]
    async fn shutdown_sends_sentinel_and_clears_registry() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.shutdown();

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(
            first.receiver.recv().await,
            Some(BroadcastEvent::shutdown())
        );
        assert_eq!(
            second.receiver.recv().await,
            Some(BroadcastEvent::shutdown())
        );
        // Senders were dropped with the registry.
        assert_eq!(first.receiver.recv().await, None);
    }

    #[tokio::test]
    async fn per_channel_delivery_is_fifo() {
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.subscribe();

        broadcaster.broadcast(&delete_event("1"));
        broadcaster.broadcast(&delete_event("2"));
        broadcaster.broadcast(&delete_event("3"));

        assert_eq!(subscription.receiver.recv().await, Some(delete_event("1")));
        assert_eq!(subscription.receiver.recv().await, Some(delete_event("2")));
        assert_eq!(subscription.receiver.recv().await, Some(delete_event("3")));
    }
}
