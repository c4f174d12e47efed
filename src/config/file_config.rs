//! TOML configuration file loading.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Raw TOML configuration. Every field is optional; resolution against CLI
/// arguments and defaults happens in [`super::AppConfig::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Address to bind the server on.
    pub host: Option<String>,

    /// Port to listen on.
    pub port: Option<u16>,

    /// Seconds of feed-session idle time between heartbeat events.
    pub heartbeat_interval_secs: Option<u64>,

    /// Maximum number of notifications retained in the store.
    pub max_notifications: Option<usize>,

    /// When true, the store keeps every notification (no eviction).
    pub unbounded: Option<bool>,

    /// Directory with the web frontend, statically served at `/`.
    pub frontend_dir_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
