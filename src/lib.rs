//! NotifyHub server library.
//!
//! A small hub that accepts notification events from producers, keeps a
//! bounded in-memory history, and fans them out live to any number of
//! connected viewers over server-sent events.

pub mod config;
pub mod events;
pub mod notifications;
pub mod server;
