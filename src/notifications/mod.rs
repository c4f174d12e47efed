//! Notification records and the bounded history store.

mod models;
mod store;

pub use models::{generate_id, normalize_timestamp, Notification};
pub use store::NotificationStore;
