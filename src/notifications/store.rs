//! Ordered, bounded notification store.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::debug;

use crate::events::{BroadcastEvent, Broadcaster};

use super::models::Notification;

/// In-memory notification history, newest first.
///
/// The store owns identity assignment, timestamp normalization, insertion
/// order, and eviction. Every mutation triggers a best-effort broadcast; the
/// mutation itself completes regardless of subscriber state, and the
/// broadcast never blocks the caller.
pub struct NotificationStore {
    notifications: Mutex<Vec<Notification>>,
    max_notifications: Option<usize>,
    broadcaster: Arc<Broadcaster>,
}

impl NotificationStore {
    /// `max_notifications = None` means unbounded. `Some(0)` is legal and
    /// keeps the store permanently empty while still broadcasting adds.
    pub fn new(max_notifications: Option<usize>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            max_notifications,
            broadcaster,
        }
    }

    /// Insert a new notification at the front, evicting the oldest record
    /// while over the bound. Returns the assigned id.
    pub fn add(&self, data: Map<String, Value>, custom_id: Option<String>) -> String {
        let record = Notification::new(data, custom_id);
        let id = record.id.clone();
        {
            let mut notifications = self.notifications.lock().expect("store lock poisoned");
            // A caller-supplied id may collide with a held record; the old
            // record gives way so ids stay unique within the store.
            notifications.retain(|n| n.id != id);
            notifications.insert(0, record.clone());
            if let Some(max) = self.max_notifications {
                while notifications.len() > max {
                    notifications.pop();
                }
            }
        }
        debug!("Added notification {}", id);
        self.broadcaster
            .broadcast(&BroadcastEvent::Notification(record));
        id
    }

    /// Remove the record with the given id. Returns false when absent.
    pub fn delete_by_id(&self, id: &str) -> bool {
        let removed = {
            let mut notifications = self.notifications.lock().expect("store lock poisoned");
            match notifications.iter().position(|n| n.id == id) {
                Some(index) => {
                    notifications.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            debug!("Deleted notification {}", id);
            self.broadcaster.broadcast(&BroadcastEvent::Delete {
                id: id.to_string(),
            });
        }
        removed
    }

    /// Empty the store unconditionally.
    pub fn clear_all(&self) {
        self.notifications
            .lock()
            .expect("store lock poisoned")
            .clear();
        debug!("Cleared all notifications");
        self.broadcaster.broadcast(&BroadcastEvent::clear());
    }

    /// Snapshot of current records, newest first.
    pub fn list(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("store lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
