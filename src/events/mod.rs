//! Event fan-out: broadcast events and the subscriber registry.

mod broadcaster;
mod event;

pub use broadcaster::{Broadcaster, Subscription};
pub use event::BroadcastEvent;
