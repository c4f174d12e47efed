mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval_secs: u64,
    pub max_notifications: usize,
    pub unbounded: bool,
    pub frontend_dir_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9080,
            heartbeat_interval_secs: 30,
            max_notifications: 1000,
            unbounded: false,
            frontend_dir_path: None,
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval_secs: u64,
    /// `None` means unbounded. `Some(0)` is a legal "discard everything"
    /// configuration, distinct from unbounded.
    pub max_notifications: Option<usize>,
    pub frontend_dir_path: Option<PathBuf>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let heartbeat_interval_secs = file
            .heartbeat_interval_secs
            .unwrap_or(cli.heartbeat_interval_secs);
        if heartbeat_interval_secs == 0 {
            bail!("heartbeat_interval_secs must be at least 1");
        }

        let unbounded = file.unbounded.unwrap_or(cli.unbounded);
        let max_notifications = if unbounded {
            None
        } else {
            Some(file.max_notifications.unwrap_or(cli.max_notifications))
        };

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone())
            .map(PathBuf::from);
        if let Some(ref dir) = frontend_dir_path {
            if !dir.is_dir() {
                bail!("Frontend directory does not exist: {:?}", dir);
            }
        }

        Ok(Self {
            host,
            port,
            heartbeat_interval_secs,
            max_notifications,
            frontend_dir_path,
        })
    }
}
