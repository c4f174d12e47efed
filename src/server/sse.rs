//! Event feed sessions.
//!
//! One session per connected viewer: an `init` snapshot of the store,
//! followed by every broadcast event, with synthetic heartbeats while idle.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::events::{BroadcastEvent, Broadcaster, Subscription};
use crate::notifications::NotificationStore;

/// How long one wait on the subscriber channel lasts before the session
/// wakes to advance its heartbeat clock.
const WAIT_BUDGET: Duration = Duration::from_secs(1);

/// Unregisters the session's channel when the stream is dropped, which
/// covers every termination path including client disconnect.
struct SubscriptionGuard {
    id: u64,
    broadcaster: Arc<Broadcaster>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

struct SessionState {
    receiver: mpsc::Receiver<BroadcastEvent>,
    idle_cycles: u64,
    heartbeat_interval: u64,
    _guard: SubscriptionGuard,
}

/// Stream of broadcast events for one viewer.
///
/// Subscribes before snapshotting the store, so an event racing the snapshot
/// is never lost; it may be seen twice (once in `init`, once live), which is
/// within the at-least-once-while-connected contract. The stream ends on the
/// shutdown sentinel or when the broadcaster drops the channel.
pub fn event_stream(
    store: &NotificationStore,
    broadcaster: Arc<Broadcaster>,
    heartbeat_interval_secs: u64,
) -> impl Stream<Item = BroadcastEvent> + Send + 'static {
    let Subscription { id, receiver } = broadcaster.subscribe();
    let snapshot = store.list();
    let guard = SubscriptionGuard { id, broadcaster };

    let state = SessionState {
        receiver,
        idle_cycles: 0,
        heartbeat_interval: heartbeat_interval_secs.max(1),
        _guard: guard,
    };

    stream::once(std::future::ready(BroadcastEvent::Init(snapshot))).chain(stream::unfold(
        state,
        |mut state| async move {
            loop {
                match timeout(WAIT_BUDGET, state.receiver.recv()).await {
                    Ok(Some(BroadcastEvent::Shutdown { .. })) => {
                        debug!("Feed session received shutdown, closing");
                        return None;
                    }
                    Ok(Some(event)) => return Some((event, state)),
                    Ok(None) => {
                        debug!("Feed session channel closed, closing");
                        return None;
                    }
                    Err(_) => {
                        state.idle_cycles += 1;
                        if state.idle_cycles >= state.heartbeat_interval {
                            state.idle_cycles = 0;
                            return Some((BroadcastEvent::heartbeat_now(), state));
                        }
                    }
                }
            }
        },
    ))
}

/// Same stream, mapped to SSE wire frames for axum.
pub fn sse_stream(
    store: &NotificationStore,
    broadcaster: Arc<Broadcaster>,
    heartbeat_interval_secs: u64,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    event_stream(store, broadcaster, heartbeat_interval_secs)
        .map(|event| Ok(to_sse_event(&event)))
}

fn to_sse_event(event: &BroadcastEvent) -> Event {
    Event::default()
        .event(event.kind())
        .data(event.data().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn payload(message: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".to_string(), Value::String(message.to_string()));
        map
    }

    fn make_store() -> (Arc<NotificationStore>, Arc<Broadcaster>) {
        let broadcaster = Arc::new(Broadcaster::new());
        let store = Arc::new(NotificationStore::new(Some(1000), broadcaster.clone()));
        (store, broadcaster)
    }

    #[tokio::test]
    async fn first_event_is_init_with_newest_first_snapshot() {
        let (store, broadcaster) = make_store();
        store.add(payload("X"), None);
        store.add(payload("Y"), None);

        let mut feed = Box::pin(event_stream(&store, broadcaster, 30));

        match feed.next().await.unwrap() {
            BroadcastEvent::Init(snapshot) => {
                assert_eq!(snapshot.len(), 2);
                assert_eq!(snapshot[0].data["message"], "Y");
                assert_eq!(snapshot[1].data["message"], "X");
            }
            other => panic!("expected init event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn add_after_connect_is_forwarded_after_init() {
        let (store, broadcaster) = make_store();
        store.add(payload("existing"), None);

        let mut feed = Box::pin(event_stream(&store, broadcaster, 30));
        let added_id = store.add(payload("Z"), None);

        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Init(_)
        ));
        match feed.next().await.unwrap() {
            BroadcastEvent::Notification(record) => {
                assert_eq!(record.id, added_id);
                assert_eq!(record.data["message"], "Z");
            }
            other => panic!("expected notification event, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_emits_periodic_heartbeats() {
        let (store, broadcaster) = make_store();
        let mut feed = Box::pin(event_stream(&store, broadcaster, 3));

        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Init(_)
        ));
        // No events at all: the next two frames are heartbeats, one per
        // elapsed interval of idle wait cycles.
        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Heartbeat { .. }
        ));
        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Heartbeat { .. }
        ));
    }

    #[tokio::test]
    async fn shutdown_ends_the_session_without_forwarding_the_sentinel() {
        let (store, broadcaster) = make_store();
        let mut feed = Box::pin(event_stream(&store, broadcaster.clone(), 30));

        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Init(_)
        ));
        broadcaster.shutdown();
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_unsubscribes() {
        let (store, broadcaster) = make_store();
        let feed = Box::pin(event_stream(&store, broadcaster.clone(), 30));
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(feed);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn delete_and_clear_are_forwarded_in_order() {
        let (store, broadcaster) = make_store();
        let mut feed = Box::pin(event_stream(&store, broadcaster, 30));

        let id = store.add(payload("A"), None);
        store.delete_by_id(&id);
        store.clear_all();

        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Init(_)
        ));
        assert!(matches!(
            feed.next().await.unwrap(),
            BroadcastEvent::Notification(_)
        ));
        assert_eq!(
            feed.next().await.unwrap(),
            BroadcastEvent::Delete { id }
        );
        assert_eq!(feed.next().await.unwrap(), BroadcastEvent::clear());
    }
}
